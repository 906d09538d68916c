//! Named thread creation for event loops
//!
//! Threads are named `<pool>-<poolId>-<n>`, e.g. `eventLoopGroup-1-3` is the
//! third loop of the first factory created in this process. The counters
//! are cosmetic; nothing depends on their values.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Process-wide factory counter
static POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Spawns loop threads with a shared naming prefix
#[derive(Debug)]
pub struct ThreadFactory {
    prefix: String,
    next_id: AtomicUsize,
    stack_size: usize,
}

impl ThreadFactory {
    /// `stack_size == 0` keeps the platform default
    pub fn new(pool_name: &str, stack_size: usize) -> Self {
        let pool_id = POOL_ID.fetch_add(1, Ordering::Relaxed) + 1;
        Self {
            prefix: format!("{}-{}-", pool_name, pool_id),
            next_id: AtomicUsize::new(0),
            stack_size,
        }
    }

    /// Factory named after a type, `EventLoopGroup` -> `eventLoopGroup`
    pub fn for_type<T: ?Sized>(stack_size: usize) -> Self {
        Self::new(&to_pool_name(std::any::type_name::<T>()), stack_size)
    }

    /// Prefix shared by every thread of this factory
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Spawn `f` on a new named thread
    pub fn new_thread<F>(&self, f: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut builder = thread::Builder::new().name(format!("{}{}", self.prefix, id));
        if self.stack_size > 0 {
            builder = builder.stack_size(self.stack_size);
        }
        builder.spawn(f)
    }
}

/// Turn a (possibly path-qualified, possibly generic) type name into a pool name
pub fn to_pool_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let simple = base.rsplit("::").next().unwrap_or(base);

    let mut chars = simple.chars();
    match (chars.next(), chars.next()) {
        (None, _) => "unknown".to_string(),
        (Some(c), None) => c.to_lowercase().collect(),
        (Some(first), Some(second)) if first.is_uppercase() && second.is_lowercase() => {
            let mut name: String = first.to_lowercase().collect();
            name.push_str(&simple[first.len_utf8()..]);
            name
        }
        _ => simple.to_string(),
    }
}
