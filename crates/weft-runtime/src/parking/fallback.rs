//! Fallback parking using std::sync::Condvar
//!
//! Used on platforms without futex support.

use super::LoopParker;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Condvar-based parker
pub struct CondvarParker {
    /// true = wakeup pending
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarParker {
    pub fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl Default for CondvarParker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopParker for CondvarParker {
    fn park(&self, timeout: Duration) -> bool {
        let guard = self.notified.lock().unwrap_or_else(|e| e.into_inner());
        let (mut guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |notified| !*notified)
            .unwrap_or_else(|e| e.into_inner());

        std::mem::replace(&mut *guard, false)
    }

    fn unpark(&self) {
        {
            let mut guard = self.notified.lock().unwrap_or_else(|e| e.into_inner());
            if *guard {
                return;
            }
            *guard = true;
        }
        self.condvar.notify_one();
    }
}
