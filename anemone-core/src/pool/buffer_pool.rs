use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch};
use crossbeam_utils::{Backoff, CachePadded};

use crate::pool::tagged_head::TaggedHead;
use crate::sequence::SortedBuffer;

type NodePtr = *mut PoolNode;

// A detached shell is handed to the epoch collector rather than freed in
// place: a peer that loaded the old head may still read `next` from it
// before its CAS fails on the bumped version tag. The tag keeps the head
// transition correct; the epoch deferral keeps that stale read backed by
// live memory.
struct PoolNode {
    buffer: *mut SortedBuffer,
    next: NodePtr,
}

/// Lock-free LIFO stack of recycled sequence buffers.
///
/// # Design
///
/// ```text
/// head ──► [shell]──►[shell]──►[shell]──► null
///             │         │         │
///          buffer     buffer    buffer
/// ```
///
/// `loan` pops a shell and takes its buffer, falling back to a fresh
/// allocation when the stack is empty; `store` pushes a new shell. The head
/// word carries a version tag advanced on every successful swap (see
/// `tagged_head`), so a pop that slept across a pop/push cycle reissuing the
/// same shell address cannot publish a stale transition.
///
/// # Invariants
///
/// 1. A buffer is owned by exactly one party: the stack, or the loaner.
/// 2. Head pushes publish with Release; pops consume with Acquire.
/// 3. Shells detached by `loan` are destroyed through the epoch collector.
///
pub struct BufferPool {
    head: CachePadded<TaggedHead<PoolNode>>,
    /// Approximate population, for recycling-bound instrumentation.
    len: AtomicUsize,
}

impl BufferPool {
    pub fn new() -> Self {
        BufferPool {
            head: CachePadded::new(TaggedHead::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Pop a recycled buffer, or allocate a fresh one when the stack is
    /// empty. Never fails externally.
    pub fn loan(&self) -> Box<SortedBuffer> {
        let guard = epoch::pin();
        let backoff = Backoff::new();

        let mut observed = self.head.load(Ordering::Acquire);
        loop {
            if observed.is_null() {
                return Box::new(SortedBuffer::new());
            }

            let node = observed.as_ptr();
            // Safety: `node` was reachable from the head word. It may have
            // been detached by a concurrent pop since, but its shell is only
            // destroyed after every pin taken before the detach has been
            // dropped, and ours predates the read.
            let next = unsafe { (*node).next };

            match self
                .head
                .compare_exchange_weak(observed, next, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(()) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);

                    // Safety: the successful CAS detached `node`; this thread
                    // is now its only owner. The buffer is extracted here and
                    // the shell goes to the collector.
                    let buffer = unsafe { Box::from_raw((*node).buffer) };
                    unsafe {
                        guard.defer_unchecked(move || {
                            drop(Box::from_raw(node));
                        });
                    }
                    return buffer;
                }
                Err(current) => {
                    observed = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Push `buffer` onto the stack. The stack takes ownership.
    pub fn store(&self, buffer: Box<SortedBuffer>) {
        let node = Box::into_raw(Box::new(PoolNode {
            buffer: Box::into_raw(buffer),
            next: ptr::null_mut(),
        }));
        let backoff = Backoff::new();

        let mut observed = self.head.load(Ordering::Relaxed);
        loop {
            // Safety: `node` is private to this thread until the CAS below
            // publishes it.
            unsafe { (*node).next = observed.as_ptr() };

            match self
                .head
                .compare_exchange_weak(observed, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(()) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(current) => {
                    observed = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Approximate number of pooled buffers.
    ///
    /// Relaxed counter; exact only when no loan or store is in flight.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // All loaners have quiesced; walk the stack single-threaded and
        // destroy shells together with their buffers.
        let mut node = self.head.load(Ordering::Acquire).as_ptr();
        while !node.is_null() {
            // Safety: exclusive access during drop; every shell on the stack
            // owns its buffer.
            let shell = unsafe { Box::from_raw(node) };
            unsafe { drop(Box::from_raw(shell.buffer)) };
            node = shell.next;
        }
    }
}

// Safety: the stack hands each buffer to exactly one loaner and every head
// transition is a tagged CAS; raw pointers are never shared mutably.
unsafe impl Send for BufferPool {}
unsafe impl Sync for BufferPool {}
