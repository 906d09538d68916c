//! # weft-runtime
//!
//! Thread-backed implementation of the weft executor model.
//!
//! This crate provides:
//! - Group configuration (env vars + builder)
//! - Loop thread parking (futex on Linux, condvar elsewhere)
//! - Named thread creation
//! - `SingleThreadEventLoop`, one OS thread per loop
//! - `ExecutorGroup` / `EventLoopGroup`, a fixed set of loops with
//!   round-robin selection and aggregated termination

pub mod config;
pub mod parking;
pub mod thread_factory;
pub mod event_loop;
pub mod group;

// Re-exports
pub use config::{ConfigError, GroupConfig};
pub use parking::{new_parker, LoopParker};
pub use thread_factory::{to_pool_name, ThreadFactory};
pub use event_loop::SingleThreadEventLoop;
pub use group::{EventLoopGroup, ExecutorGroup};
