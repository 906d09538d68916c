//! Executor selection strategies
//!
//! A chooser hands out indices into a fixed array of executors, one per
//! unit of work (typically one per accepted connection). Both strategies
//! are plain round-robin over an atomic counter, so `next_index` is safe
//! to call from any number of threads without extra locking.
//!
//! ```text
//!  len = 4 (power of two)        len = 3
//!  idx & 3                       idx % 3
//!  0 1 2 3 0 1 2 3 ...           0 1 2 0 1 2 ...
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Picks the next executor index in `0..len`
pub trait ExecutorChooser: Send + Sync {
    /// Index of the executor that should take the next unit of work
    fn next_index(&self) -> usize;

    /// Number of executors this chooser was built for
    fn len(&self) -> usize;
}

/// Builds a chooser for an executor array of a given length
pub trait ChooserFactory: Send + Sync {
    /// `len` is always at least 1
    fn new_chooser(&self, len: usize) -> Box<dyn ExecutorChooser>;
}

/// Mask-based round robin, valid only when `len` is a power of two
pub struct PowerOfTwoChooser {
    idx: AtomicUsize,
    mask: usize,
}

impl PowerOfTwoChooser {
    pub fn new(len: usize) -> Self {
        debug_assert!(len.is_power_of_two(), "length {} is not a power of two", len);
        Self {
            idx: AtomicUsize::new(0),
            mask: len - 1,
        }
    }
}

impl ExecutorChooser for PowerOfTwoChooser {
    #[inline]
    fn next_index(&self) -> usize {
        // wrapping_add on overflow keeps the cycle intact because the
        // modulus divides 2^64
        self.idx.fetch_add(1, Ordering::Relaxed) & self.mask
    }

    fn len(&self) -> usize {
        self.mask + 1
    }
}

/// Modulo round robin for any length
pub struct GenericChooser {
    idx: AtomicU64,
    len: usize,
}

impl GenericChooser {
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0);
        Self {
            idx: AtomicU64::new(0),
            len,
        }
    }
}

impl ExecutorChooser for GenericChooser {
    #[inline]
    fn next_index(&self) -> usize {
        // 64-bit counter so the modulo never sees a wraparound in practice
        (self.idx.fetch_add(1, Ordering::Relaxed) % self.len as u64) as usize
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Uses `PowerOfTwoChooser` when it can, `GenericChooser` otherwise
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChooserFactory;

impl ChooserFactory for DefaultChooserFactory {
    fn new_chooser(&self, len: usize) -> Box<dyn ExecutorChooser> {
        if len.is_power_of_two() {
            Box::new(PowerOfTwoChooser::new(len))
        } else {
            Box::new(GenericChooser::new(len))
        }
    }
}
