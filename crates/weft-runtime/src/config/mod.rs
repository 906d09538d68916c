//! Event loop group configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder setters
//! 2. Environment variables (`from_env()`)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_runtime::config::GroupConfig;
//!
//! let config = GroupConfig::from_env()
//!     .num_loops(4)
//!     .quiet_period(Duration::from_millis(100));
//! ```

pub mod defaults;

use std::time::Duration;

use thiserror::Error;
use weft_core::env::{env_get, env_get_ms};

/// Configuration of an `EventLoopGroup` and its loops.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Number of event loops (threads) in the group
    pub num_loops: usize,
    /// Pool name used for thread names
    pub pool_name: String,
    /// Quiet period used by `shutdown_gracefully_default`
    pub quiet_period: Duration,
    /// Deadline used by `shutdown_gracefully_default`
    pub shutdown_timeout: Duration,
    /// Longest idle sleep of a loop
    pub park_timeout: Duration,
    /// Stack size of loop threads, 0 = platform default
    pub stack_size: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl GroupConfig {
    /// Library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `WEFT_NUM_LOOPS` - Number of event loops
    /// - `WEFT_POOL_NAME` - Thread name prefix
    /// - `WEFT_QUIET_PERIOD_MS` - Graceful shutdown quiet period
    /// - `WEFT_SHUTDOWN_TIMEOUT_MS` - Graceful shutdown deadline
    /// - `WEFT_PARK_TIMEOUT_MS` - Max idle sleep per loop
    /// - `WEFT_STACK_SIZE` - Loop thread stack size in bytes
    pub fn from_env() -> Self {
        Self {
            num_loops: env_get("WEFT_NUM_LOOPS", defaults::num_loops()),
            pool_name: env_get("WEFT_POOL_NAME", defaults::POOL_NAME.to_string()),
            quiet_period: env_get_ms("WEFT_QUIET_PERIOD_MS", defaults::QUIET_PERIOD_MS),
            shutdown_timeout: env_get_ms(
                "WEFT_SHUTDOWN_TIMEOUT_MS",
                defaults::SHUTDOWN_TIMEOUT_MS,
            ),
            park_timeout: env_get_ms("WEFT_PARK_TIMEOUT_MS", defaults::PARK_TIMEOUT_MS),
            stack_size: env_get("WEFT_STACK_SIZE", defaults::STACK_SIZE),
        }
    }

    /// Library defaults only, no env lookup.
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            num_loops: defaults::num_loops(),
            pool_name: defaults::POOL_NAME.to_string(),
            quiet_period: Duration::from_millis(defaults::QUIET_PERIOD_MS),
            shutdown_timeout: Duration::from_millis(defaults::SHUTDOWN_TIMEOUT_MS),
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
            stack_size: defaults::STACK_SIZE,
        }
    }

    // Builder methods

    pub fn num_loops(mut self, n: usize) -> Self {
        self.num_loops = n;
        self
    }

    pub fn pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    pub fn quiet_period(mut self, d: Duration) -> Self {
        self.quiet_period = d;
        self
    }

    pub fn shutdown_timeout(mut self, d: Duration) -> Self {
        self.shutdown_timeout = d;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_loops == 0 {
            return Err(ConfigError::InvalidValue("num_loops must be > 0"));
        }
        if self.num_loops > defaults::MAX_LOOPS {
            return Err(ConfigError::InvalidValue("num_loops must be <= 1024"));
        }
        if self.pool_name.is_empty() {
            return Err(ConfigError::InvalidValue("pool_name must not be empty"));
        }
        if self.quiet_period > self.shutdown_timeout {
            return Err(ConfigError::InvalidValue(
                "quiet_period must be <= shutdown_timeout",
            ));
        }
        if self.park_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("park_timeout must be > 0"));
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    InvalidValue(&'static str),
}
