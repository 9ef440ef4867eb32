use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::pool::BufferPool;
use crate::reclaim::Reclaim;
use crate::sequence::SortedBuffer;

///
/// Concurrent sorted sequence with copy-on-write snapshot publication.
///
// =============================================================================
// PUBLICATION PROTOCOL
// =============================================================================
//
// One atomic cell designates the current snapshot:
//
//   current ──► [ 1 | 4 | 9 ]   (immutable once published)
//
// A writer never mutates a published buffer. It loans a private scratch
// buffer, copies the snapshot into it, inserts the new value in order, and
// tries to swing the cell:
//
//   scratch = pool.loan()            LOADED
//   old     = current  (Acquire)
//   scratch <- *old + value          COPIED
//   CAS current: old -> scratch
//        ├── success (Release)       PUBLISHED: retire old, done
//        └── failure (Acquire)       CONFLICTED: pool.store(scratch), retry
//
// CAS failure is the normal contended path, not an error. Retries are
// unbounded; at least one writer per round of contention publishes, so the
// container is lock-free but not wait-free.
//
// =============================================================================
// RECLAMATION
// =============================================================================
//
// A reader is one Acquire load plus one dereference, with no guard taken.
// The displaced buffer therefore must outlive every reader that loaded its
// address before the CAS. That delay is the reclamation strategy's contract
// (see `Reclaim`): the production strategy destroys a retirement only after
// a grace period exceeding any reader's load-to-dereference latency.
//
// INVARIANTS:
// 1. `current` is never null between construction and destruction.
// 2. A published buffer is never mutated.
// 3. A retired buffer is never again reachable from `current`, the pool,
//    or a live writer.
// 4. Retirement order equals publication-displacement order.
//
pub struct SortedSequence<R: Reclaim> {
    current: CachePadded<AtomicPtr<SortedBuffer>>,
    pool: BufferPool,
    // Declared last: dropped after the final retirement in `Drop`, so a
    // worker-backed strategy shuts down with the last buffer enqueued.
    reclaimer: R,
}

impl<R: Reclaim> SortedSequence<R> {
    /// Create an empty sequence with its reclamation strategy running.
    pub fn new() -> Self {
        Self::with_reclaimer(R::default())
    }

    /// Create an empty sequence around a pre-configured strategy (e.g. a
    /// non-default grace interval).
    pub fn with_reclaimer(reclaimer: R) -> Self {
        let empty = Box::into_raw(Box::new(SortedBuffer::new()));
        SortedSequence {
            current: CachePadded::new(AtomicPtr::new(empty)),
            pool: BufferPool::new(),
            reclaimer,
        }
    }

    /// Insert `value` at its sorted position.
    ///
    /// Thread-safe; any number of writers may insert concurrently while
    /// readers keep reading.
    pub fn insert(&self, value: i32) {
        let backoff = Backoff::new();

        loop {
            let mut scratch = self.pool.loan();
            let old = self.current.load(Ordering::Acquire);

            // Safety: `old` was just read from the cell; a displaced buffer
            // outlives in-flight dereferences per the strategy's contract,
            // and a published one is immutable.
            scratch.copy_from(unsafe { &*old });
            scratch.insert_sorted(value);

            let fresh = Box::into_raw(scratch);
            match self.current.compare_exchange_weak(
                old,
                fresh,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(displaced) => {
                    // Safety: the CAS removed `displaced` from the cell; no
                    // new reader can reach it, the pool never held it, and
                    // this writer is done with it.
                    unsafe { self.reclaimer.retire(displaced) };
                    return;
                }
                Err(_) => {
                    // Lost the race. Hand the scratch buffer back and retry
                    // against the fresher snapshot.
                    let scratch = unsafe { Box::from_raw(fresh) };
                    self.pool.store(scratch);
                    backoff.spin();
                }
            }
        }
    }

    /// Read the element at `pos` in the currently published snapshot.
    ///
    /// A single atomic load plus one dereference; no stability is promised
    /// beyond the load. Panics when `pos` is out of range of the snapshot
    /// the load observed.
    pub fn read(&self, pos: usize) -> i32 {
        let snapshot = self.current.load(Ordering::Acquire);
        // Safety: see `insert` - published buffers are immutable and outlive
        // every reader that loaded their address.
        unsafe { (*snapshot).value_at(pos) }
    }

    /// Bounds-checked read against the currently published snapshot.
    pub fn get(&self, pos: usize) -> Option<i32> {
        let snapshot = self.current.load(Ordering::Acquire);
        // Safety: as in `read`.
        unsafe { (*snapshot).get(pos) }
    }

    /// Length of the currently published snapshot.
    pub fn len(&self) -> usize {
        let snapshot = self.current.load(Ordering::Acquire);
        // Safety: as in `read`.
        unsafe { (*snapshot).len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the currently published snapshot.
    pub fn to_vec(&self) -> Vec<i32> {
        let snapshot = self.current.load(Ordering::Acquire);
        // Safety: as in `read`.
        unsafe { (*snapshot).to_vec() }
    }

    /// The pool's approximate population, for recycling-bound tests.
    pub fn pooled_buffers(&self) -> usize {
        self.pool.len()
    }

    /// The reclamation strategy owned by this sequence.
    pub fn reclaimer(&self) -> &R {
        &self.reclaimer
    }
}

impl<R: Reclaim> Default for SortedSequence<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Reclaim> Drop for SortedSequence<R> {
    fn drop(&mut self) {
        // Retire the final snapshot, then let the fields drop in declaration
        // order: the pool drains its stack, and the reclaimer - last - shuts
        // down with the final buffer among its residuals.
        let last = *self.current.get_mut();
        // Safety: exclusive access; `last` leaves the cell for good here.
        unsafe { self.reclaimer.retire(last) };
    }
}

// Safety: the cell only ever holds buffers that are immutable once
// published; ownership transfers (pool loan, CAS publish, retirement) are
// single-handover by construction.
unsafe impl<R: Reclaim> Send for SortedSequence<R> {}
unsafe impl<R: Reclaim> Sync for SortedSequence<R> {}
