//! Environment variable helpers used by the config layers
//!
//! Every knob in weft has a compile-time default that an environment
//! variable may override. Unset or unparsable values fall back to the
//! default silently.
//!
//! ```ignore
//! use weft_core::env::{env_get, env_get_bool, env_get_ms};
//!
//! let loops: usize = env_get("WEFT_NUM_LOOPS", 4);
//! let fail_fast = env_get_bool("WEFT_FAIL_FAST", true);
//! let quiet = env_get_ms("WEFT_QUIET_PERIOD_MS", 2000);
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse `key` as `T`, or return `default`
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Boolean flag.
///
/// "1", "true", "yes", "on" are true and "0", "false", "no", "off" are
/// false (case-insensitive). Anything else keeps the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Millisecond duration
#[inline]
pub fn env_get_ms(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_get(key, default_ms))
}
