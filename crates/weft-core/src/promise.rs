//! Single-fire completion signal
//!
//! A `Promise` starts pending and is completed at most once. Clones share
//! the same state, so a loop can hand out its termination promise to any
//! number of observers and complete it from its own thread.
//!
//! Listeners registered before completion run exactly once on the thread
//! that completes the promise. Listeners registered afterwards run
//! immediately on the registering thread. `wait` returns only after the
//! completing thread has run its listeners.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::warn;

type Listener = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle to a one-shot completion signal
#[derive(Clone)]
pub struct Promise {
    inner: Arc<PromiseInner>,
}

struct PromiseInner {
    state: Mutex<PromiseState>,
    cond: Condvar,
}

#[derive(Default)]
struct PromiseState {
    done: bool,
    /// Listeners taken at completion have all run
    settled: bool,
    listeners: Vec<Listener>,
}

impl Promise {
    /// Create a pending promise
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                state: Mutex::new(PromiseState::default()),
                cond: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PromiseState> {
        // Listeners never run under the lock, so poisoning can only come
        // from a panic between two field writes; the state stays coherent.
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Complete the promise.
    ///
    /// Returns `true` for the call that actually completed it, `false`
    /// for every later call.
    pub fn try_complete(&self) -> bool {
        let listeners = {
            let mut state = self.lock();
            if state.done {
                return false;
            }
            state.done = true;
            std::mem::take(&mut state.listeners)
        };

        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(listener)).is_err() {
                warn!("promise listener panicked");
            }
        }

        self.lock().settled = true;
        self.inner.cond.notify_all();
        true
    }

    /// Whether the promise has been completed
    #[inline]
    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Run `f` once the promise completes (or right now if it already has)
    pub fn add_listener<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.lock();
            if !state.done {
                state.listeners.push(Box::new(f));
                return;
            }
        }
        f();
    }

    /// Block until completed
    pub fn wait(&self) {
        let mut state = self.lock();
        while !state.settled {
            state = self.inner.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block until completed or `timeout` elapses. Returns whether it completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .inner
            .cond
            .wait_timeout_while(state, timeout, |s| !s.settled)
            .unwrap_or_else(|e| e.into_inner());
        state.settled
    }

    /// Whether two handles refer to the same promise
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("done", &self.is_done())
            .finish()
    }
}
