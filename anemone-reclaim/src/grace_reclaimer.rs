//! Time-delayed destruction of retired snapshot buffers.
//!
//! # Design
//!
//! ```text
//! writer ──retire──► [ (buffer, t₀) (buffer, t₁) ... ]  FIFO queue
//!                           │
//!                           ▼  worker thread
//!                    destroy head once  t + GRACE <= now
//! ```
//!
//! A reader performs one atomic load of the snapshot cell and one
//! dereference, without taking a guard. The grace interval is what makes
//! that safe: a buffer displaced from the cell stays live until every
//! reader that loaded its address has had ample time to finish the
//! dereference. The interval is a tuning constant, not a correctness
//! parameter, once it exceeds the longest reader critical section.
//!
//! Retirement order equals publication-displacement order, and the queue
//! is FIFO, so destruction order equals retirement order.
//!
//! # Shutdown ordering
//!
//! 1. stop flag set (under the queue lock)
//! 2. worker signalled
//! 3. worker joined
//! 4. residual records destroyed irrespective of age
//!
//! The sequence retires its final snapshot *before* the strategy drops, so
//! the final buffer is among the residuals.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anemone_core::{Reclaim, SortedBuffer};
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Comfortably above a load-plus-dereference reader critical section, low
/// enough that shutdown and tests stay quick.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(40);

struct RetiredBuffer(*mut SortedBuffer);

// Safety: the pointer is uniquely owned by its retirement record; only the
// worker (or the residual drain, after the join) ever touches it.
unsafe impl Send for RetiredBuffer {}

/// A retirement record: the displaced buffer and the moment it left the
/// snapshot cell.
struct Retired {
    buffer: RetiredBuffer,
    retired_at: Instant,
}

struct Shared {
    grace: Duration,
    queue: Mutex<VecDeque<Retired>>,
    retirements: Condvar,
    stop: AtomicBool,
}

/// Reclamation strategy that destroys retired buffers on a background
/// worker after a fixed grace interval.
///
/// Owned by the sequence that retires into it; the worker's lifetime is
/// tied to the strategy's, not the process's.
///
pub struct GraceReclaimer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl GraceReclaimer {
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_GRACE)
    }

    /// Create a reclaimer with a custom grace interval.
    ///
    /// Correctness requires `grace` to exceed the longest plausible reader
    /// critical section (snapshot load to end of dereference); beyond that
    /// it only trades memory headroom against destruction latency.
    pub fn with_grace(grace: Duration) -> Self {
        let shared = Arc::new(Shared {
            grace,
            queue: Mutex::new(VecDeque::new()),
            retirements: Condvar::new(),
            stop: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("anemone-reclaimer".into())
            .spawn(move || worker_loop(&worker_shared))
            .expect("failed to spawn reclaimer worker");

        GraceReclaimer {
            shared,
            worker: Some(worker),
        }
    }

    /// Number of retirements awaiting destruction.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// The configured grace interval.
    pub fn grace(&self) -> Duration {
        self.shared.grace
    }

    /// Stop the worker and destroy every remaining record.
    ///
    /// Idempotent. Callable only once no reader or writer is in flight,
    /// which the sequence's `Drop` guarantees.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            // Set the flag under the lock so the worker cannot re-check its
            // predicate between our store and our notify.
            {
                let _queue = self.shared.queue.lock();
                self.shared.stop.store(true, Ordering::Release);
            }
            self.shared.retirements.notify_one();

            // Worker death before the stop is a fatal invariant violation;
            // the container could not have continued safely anyway.
            worker.join().expect("reclaimer worker panicked");
        }

        // No reader remains: age no longer matters. Runs on repeat calls
        // too, catching any retirement that slipped in after the join.
        let residual: Vec<Retired> = self.shared.queue.lock().drain(..).collect();
        destroy(residual);
    }
}

impl Default for GraceReclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaim for GraceReclaimer {
    unsafe fn retire(&self, buffer: *mut SortedBuffer) {
        let record = Retired {
            buffer: RetiredBuffer(buffer),
            retired_at: Instant::now(),
        };

        let mut queue = self.shared.queue.lock();
        queue.push_back(record);
        drop(queue);

        // Wake the worker in case this retirement is the next deadline.
        self.shared.retirements.notify_one();
    }
}

impl Drop for GraceReclaimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    let mut queue = shared.queue.lock();
    loop {
        while queue.is_empty() && !shared.stop.load(Ordering::Acquire) {
            shared.retirements.wait(&mut queue);
        }

        if shared.stop.load(Ordering::Acquire) {
            // Residuals are drained by `shutdown` after the join.
            return;
        }

        // Destroy every record whose grace interval has elapsed, oldest
        // first. The queue is FIFO over monotonic timestamps, so the due
        // records form a prefix.
        let now = Instant::now();
        let due_count = queue
            .iter()
            .take_while(|record| record.retired_at + shared.grace <= now)
            .count();

        if due_count > 0 {
            let due: Vec<Retired> = queue.drain(..due_count).collect();
            // Deallocate without holding the lock; a writer's retire()
            // should never wait on the allocator.
            MutexGuard::unlocked(&mut queue, || destroy(due));
            continue;
        }

        if let Some(head) = queue.front() {
            // Sleep until the head comes due or a retirement/stop signal
            // arrives, then re-evaluate from the top.
            let deadline = head.retired_at + shared.grace;
            let _ = shared.retirements.wait_until(&mut queue, deadline);
        }
    }
}

fn destroy(records: Vec<Retired>) {
    for record in records {
        // Safety: retire's contract transferred sole ownership of the
        // buffer to this record, and the record is consumed here.
        unsafe { drop(Box::from_raw(record.buffer.0)) };
    }
}
