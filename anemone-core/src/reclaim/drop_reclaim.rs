//! Drop-time reclamation for testing.
//!
//! This module provides `DropReclaim`, a strategy that holds every retired
//! buffer until the strategy itself is dropped.

#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::sync::Mutex;

use super::Reclaim;
use crate::sequence::SortedBuffer;

/// A strategy that defers all destruction until the strategy is dropped.
///
/// This is useful for tests that want deterministic destruction timing: a
/// retired buffer is guaranteed to stay live for the container's whole
/// lifetime, so no timing assumption can be violated. Not suitable for
/// long-running use, as retired buffers accumulate until drop.
///
/// # Thread Safety
///
/// Retirements from multiple writer threads are collected under a `Mutex`;
/// the buffers are freed when the strategy is dropped.
///
pub struct DropReclaim {
    retired: Mutex<Vec<RetiredPtr>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct RetiredPtr(*mut SortedBuffer);

// Safety: the pointer is uniquely owned by the retirement list and only
// touched under the Mutex or during Drop.
unsafe impl Send for RetiredPtr {}

impl DropReclaim {
    pub fn new() -> Self {
        DropReclaim {
            retired: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of buffers retired so far.
    pub fn retired_count(&self) -> usize {
        self.retired.lock().unwrap().len()
    }
}

impl Default for DropReclaim {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaim for DropReclaim {
    unsafe fn retire(&self, buffer: *mut SortedBuffer) {
        #[cfg(debug_assertions)]
        {
            let addr = buffer as usize;
            let mut seen = self.seen.lock().unwrap();
            if !seen.insert(addr) {
                panic!("buffer retired twice: {:#x}", addr);
            }
        }

        self.retired.lock().unwrap().push(RetiredPtr(buffer));
    }
}

impl Drop for DropReclaim {
    fn drop(&mut self) {
        let retired = self.retired.get_mut().unwrap();

        // A duplicate here means some buffer was retired twice and would be
        // freed twice below; fail loudly instead.
        let mut seen = std::collections::HashSet::new();
        for entry in retired.iter() {
            assert!(
                seen.insert(entry.0 as usize),
                "duplicate pointer in retirement list: {:#x}",
                entry.0 as usize
            );
        }

        for entry in retired.drain(..) {
            // Safety: retire's contract makes this list the sole owner.
            unsafe { drop(Box::from_raw(entry.0)) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retire_and_drop() {
        let reclaim = DropReclaim::default();

        let buffer = Box::into_raw(Box::new(SortedBuffer::new()));
        unsafe { reclaim.retire(buffer) };

        assert_eq!(reclaim.retired_count(), 1);
        // Buffer freed when `reclaim` drops.
    }

    #[test]
    fn test_multiple_retirements() {
        let reclaim = DropReclaim::default();

        for _ in 0..10 {
            let buffer = Box::into_raw(Box::new(SortedBuffer::new()));
            unsafe { reclaim.retire(buffer) };
        }

        assert_eq!(reclaim.retired_count(), 10);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "retired twice")]
    fn test_double_retire_panics() {
        let reclaim = DropReclaim::default();

        let buffer = Box::into_raw(Box::new(SortedBuffer::new()));
        unsafe { reclaim.retire(buffer) };
        unsafe { reclaim.retire(buffer) };
    }
}
