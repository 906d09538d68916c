//! # weft-core
//!
//! Core types and traits for weft event loops.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The thread-backed loop and the group live in `weft-runtime`.
//!
//! ## Modules
//!
//! - `executor` - `EventExecutor` capability trait and the `Task` type
//! - `promise` - Single-fire completion signal with listeners
//! - `chooser` - Round-robin executor selection strategies
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod executor;
pub mod promise;
pub mod chooser;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use executor::{EventExecutor, EventExecutorExt, Task};
pub use promise::Promise;
pub use chooser::{
    ChooserFactory, DefaultChooserFactory, ExecutorChooser, GenericChooser, PowerOfTwoChooser,
};
pub use error::{BoxError, ExecutorError, ExecutorResult};
pub use env::{env_get, env_get_bool, env_get_ms};
