//! Event loop parking
//!
//! An idle loop parks its thread until a producer submits a task or the
//! park timeout expires. Each parker has exactly one parking thread (the
//! loop) and any number of unparking threads (producers).
//!
//! A wakeup that arrives while the loop is busy is remembered, so the next
//! `park()` returns immediately instead of sleeping on a non-empty queue.

use std::time::Duration;

/// Single-waiter park/unpark primitive
pub trait LoopParker: Send + Sync {
    /// Park the loop thread until unparked or `timeout` elapses.
    ///
    /// Returns `true` if a wakeup was consumed. Callers re-check their
    /// queue regardless of the return value.
    fn park(&self, timeout: Duration) -> bool;

    /// Wake the loop thread, or make its next `park()` return immediately.
    fn unpark(&self);
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParker as PlatformParker;
    } else {
        mod fallback;
        pub use fallback::CondvarParker as PlatformParker;
    }
}

/// Create a new platform-appropriate parker
pub fn new_parker() -> Box<dyn LoopParker> {
    Box::new(PlatformParker::new())
}
