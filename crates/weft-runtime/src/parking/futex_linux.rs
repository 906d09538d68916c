//! Linux futex-based loop parking
//!
//! Futex word semantics:
//! - 0 = no wakeup pending
//! - 1 = wakeup pending (loop should re-check its queue)
//!
//! Park: consume a pending wakeup if there is one, otherwise FUTEX_WAIT
//! while the word is 0, then consume whatever arrived.
//! Unpark: set the word to 1; only the 0 -> 1 transition issues FUTEX_WAKE.

use super::LoopParker;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const IDLE: u32 = 0;
const NOTIFIED: u32 = 1;

/// Linux futex-based parker
pub struct FutexParker {
    futex: AtomicU32,
}

impl FutexParker {
    pub fn new() -> Self {
        Self {
            futex: AtomicU32::new(IDLE),
        }
    }
}

impl Default for FutexParker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopParker for FutexParker {
    fn park(&self, timeout: Duration) -> bool {
        if self.futex.swap(IDLE, Ordering::Acquire) == NOTIFIED {
            return true;
        }

        let ts = libc::timespec {
            tv_sec: timeout.as_secs().min(i64::MAX as u64) as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };

        // FUTEX_WAIT: sleep only while the word is still IDLE.
        // ETIMEDOUT, EAGAIN and EINTR all fall through to the swap below.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                IDLE,
                &ts as *const libc::timespec,
                std::ptr::null::<u32>(),
                0u32,
            );
        }

        self.futex.swap(IDLE, Ordering::Acquire) == NOTIFIED
    }

    fn unpark(&self) {
        if self.futex.swap(NOTIFIED, Ordering::Release) == NOTIFIED {
            return; // already pending, the loop will see it
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}
