//! Cross-thread slot returns.
//!
//! The pool's CAS discipline assumes one owning thread. When another
//! thread must free, it pushes the slot here instead, and the owner
//! drains the queue back into the free list between hot-path bursts.
//! This keeps contended CAS (and the ABA window) off foreign threads.

use std::ptr::NonNull;

use concurrent_queue::ConcurrentQueue;

use crate::pool::SlotPool;

struct ReturnedSlot<T>(NonNull<T>);

// SAFETY: a returned slot is just an address into the pool's storage;
// the `Copy` payload behind it is done with by the pushing thread.
unsafe impl<T: Send> Send for ReturnedSlot<T> {}

/// Bounded MPSC channel of freed slots, drained by the pool's owner.
pub struct ReturnQueue<T: Copy> {
    queue: ConcurrentQueue<ReturnedSlot<T>>,
}

impl<T: Copy> ReturnQueue<T> {
    /// Builds a queue able to hold every slot of the paired pool, so a
    /// contract-abiding push can never find it full.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: ConcurrentQueue::bounded(capacity),
        }
    }

    /// Enqueues a slot freed by a non-owner thread.
    ///
    /// On a full queue the slot is handed back in `Err`, only reachable
    /// when more slots are pushed than the paired pool can hand out.
    ///
    /// # Safety
    /// Same provenance contract as [`SlotPool::deallocate`]: the pointer
    /// must come from `allocate` on the paired pool and must not be
    /// returned twice.
    pub unsafe fn push(&self, slot: NonNull<T>) -> Result<(), NonNull<T>> {
        self.queue
            .push(ReturnedSlot(slot))
            .map_err(|full| full.into_inner().0)
    }

    /// Drains every queued slot into `pool`'s free list, returning the
    /// number of slots handed back.
    ///
    /// Called by the owning thread only.
    ///
    /// # Safety
    /// `pool` must be the pool whose slots were pushed into this queue.
    pub unsafe fn drain_into(&self, pool: &SlotPool<'_, T>) -> usize {
        let mut drained = 0;
        while let Ok(slot) = self.queue.pop() {
            pool.deallocate(slot.0);
            drained += 1;
        }
        drained
    }

    /// Slots waiting to be drained.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.queue.capacity().unwrap_or(usize::MAX)
    }
}
