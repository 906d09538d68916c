//! The `EventExecutor` capability
//!
//! An event executor is a single logical thread: tasks submitted to it run
//! one at a time, in submission order, on that thread. Anything that owns
//! per-connection state (decoders, cumulation buffers) relies on this to
//! skip synchronization entirely.
//!
//! `ExecutorGroup` in `weft-runtime` is generic over this trait, so tests
//! and embedders can plug in their own executors.

use std::time::Duration;

use crate::error::ExecutorResult;
use crate::promise::Promise;

/// A unit of work for an executor
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Single-threaded, FIFO task executor with a graceful lifecycle
pub trait EventExecutor: Send + Sync + 'static {
    /// Queue `task` to run after every task submitted before it.
    ///
    /// Returns `Err(ExecutorError::Rejected)` once the executor is shut down.
    fn execute(&self, task: Task) -> ExecutorResult<()>;

    /// Whether the calling thread is this executor's thread
    fn in_event_loop(&self) -> bool;

    /// Ask the executor to stop.
    ///
    /// Queued work keeps draining until no task has run for `quiet_period`,
    /// and the executor stops no later than `timeout` after this call.
    /// Idempotent; always returns the termination promise.
    fn shutdown_gracefully(&self, quiet_period: Duration, timeout: Duration) -> Promise;

    fn is_shutting_down(&self) -> bool;

    fn is_shutdown(&self) -> bool;

    fn is_terminated(&self) -> bool;

    /// Block up to `timeout` for termination. Returns `is_terminated()`.
    fn await_termination(&self, timeout: Duration) -> bool;

    /// Completed exactly once, when the executor has terminated
    fn termination_future(&self) -> Promise;
}

/// Convenience for submitting closures without boxing at every call site
pub trait EventExecutorExt: EventExecutor {
    fn spawn<F>(&self, f: F) -> ExecutorResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(f))
    }
}

impl<E: EventExecutor + ?Sized> EventExecutorExt for E {}
