//! ## snabbmem-core::pool
//! **Lock-free fixed-size slot pool over a [`NumaArena`]**
//!
//! ### Expectations (Production):
//! - `allocate`/`deallocate` are single CAS operations (no locks, no
//!   syscalls, no heap traffic)
//! - Exhaustion is a steady-state signal (`None`), not a fault
//! - One owning thread per pool; cross-thread frees go through
//!   [`crate::return_queue::ReturnQueue`]
//!
//! ### Free list
//! A Treiber stack threaded through the slots themselves: a free slot's
//! first word is the `next` link, an allocated slot's bytes are the
//! payload. The reinterpretation is sound only because payloads are
//! `Copy` (nothing to drop, nothing to run twice) and the pool protocol
//! keeps every slot in exactly one of the two states.
//!
//! ### ABA
//! Slots are recycled, never released, so a head cached across a
//! pop/push of the same node can corrupt a naive CAS loop. The contract
//! here is discipline rather than tagging: allocation and deallocation
//! belong to one owning thread, and foreign threads return slots through
//! the per-pool return queue that the owner drains.

use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

#[cfg(debug_assertions)]
use std::sync::atomic::AtomicBool;

use crate::arena::{round_up, NumaArena, CACHE_LINE};
use crate::error::MemError;
use crate::stats::PoolStats;

/// Free-list link living in the first word of a free slot.
#[repr(C)]
struct FreeNode {
    next: *mut FreeNode,
}

/// Cache-line aligned head, isolated from the neighboring fields.
#[repr(align(64))]
#[derive(Debug)]
struct AlignedHead(AtomicPtr<FreeNode>);

/// Fixed-size, cache-line aligned slot allocator.
///
/// One instance serves one payload size; different sizes want different
/// pools over different arenas. The arena borrow keeps the backing
/// region alive for at least as long as the pool. A pool claims the
/// arena's region from its base, so one pool per arena is the supported
/// pairing.
#[derive(Debug)]
pub struct SlotPool<'a, T: Copy> {
    free_head: AlignedHead,
    storage: NonNull<u8>,
    capacity: usize,
    slot_size: usize,
    stats: PoolStats,
    #[cfg(debug_assertions)]
    slot_live: Box<[AtomicBool]>,
    _arena: PhantomData<&'a NumaArena>,
    _payload: PhantomData<*mut T>,
}

// SAFETY: the free list is the only mutable shared state and every
// mutation goes through the CAS loop; payloads are `Copy` data handed
// across threads only per the pool contract.
unsafe impl<T: Copy + Send> Send for SlotPool<'_, T> {}
unsafe impl<T: Copy + Send> Sync for SlotPool<'_, T> {}

impl<'a, T: Copy> SlotPool<'a, T> {
    /// Builds a pool of `capacity` slots sized for `T`.
    pub fn new(arena: &'a NumaArena, capacity: usize) -> Result<Self, MemError> {
        Self::with_slot_size(arena, capacity, mem::size_of::<T>())
    }

    /// Builds a pool with explicit payload headroom per slot.
    ///
    /// The effective slot size is `payload_bytes`, raised to at least
    /// the free-list link and `size_of::<T>()`, then rounded up to a
    /// cache-line multiple.
    pub fn with_slot_size(
        arena: &'a NumaArena,
        capacity: usize,
        payload_bytes: usize,
    ) -> Result<Self, MemError> {
        assert!(capacity > 0, "capacity must be greater than zero");
        assert!(
            mem::align_of::<T>() <= CACHE_LINE,
            "payload alignment exceeds a cache line"
        );

        let slot_size = round_up(
            payload_bytes
                .max(mem::size_of::<T>())
                .max(mem::size_of::<FreeNode>()),
            CACHE_LINE,
        );
        if capacity
            .checked_mul(slot_size)
            .map_or(true, |needed| needed > arena.size())
        {
            return Err(MemError::ArenaTooSmall {
                arena_bytes: arena.size(),
                capacity,
                slot_bytes: slot_size,
            });
        }

        let storage = arena.base();
        // One pass over the backing storage linking every slot; the head
        // ends at the highest-addressed slot.
        let mut prev: *mut FreeNode = ptr::null_mut();
        for i in 0..capacity {
            // SAFETY: (i + 1) * slot_size <= capacity * slot_size, which
            // fits the arena, and the page-aligned base plus a cache-line
            // multiple is a valid, aligned FreeNode location.
            unsafe {
                let node = storage.add(i * slot_size).cast::<FreeNode>();
                (*node).next = prev;
                prev = node;
            }
        }

        Ok(Self {
            free_head: AlignedHead(AtomicPtr::new(prev)),
            // SAFETY: the arena base is non-null by construction.
            storage: unsafe { NonNull::new_unchecked(storage) },
            capacity,
            slot_size,
            stats: PoolStats::new(),
            #[cfg(debug_assertions)]
            slot_live: (0..capacity).map(|_| AtomicBool::new(false)).collect(),
            _arena: PhantomData,
            _payload: PhantomData,
        })
    }

    /// Pops one slot off the free list.
    ///
    /// O(1), lock-free, no syscalls. `None` means the pool is exhausted,
    /// an expected signal the caller handles (drop, back off), never a
    /// fault.
    #[inline]
    pub fn allocate(&self) -> Option<NonNull<T>> {
        let mut head = self.free_head.0.load(Ordering::Acquire);
        loop {
            if head.is_null() {
                self.stats.record_exhaustion();
                return None;
            }
            // SAFETY: a non-null head is a linked free slot; its first
            // word is the next link.
            let next = unsafe { (*head).next };
            match self.free_head.0.compare_exchange_weak(
                head,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.stats.record_allocation();
                    #[cfg(debug_assertions)]
                    self.mark_allocated(head.cast());
                    // SAFETY: head was non-null and is exclusively ours
                    // after the successful swap.
                    return Some(unsafe { NonNull::new_unchecked(head.cast::<T>()) });
                }
                Err(observed) => head = observed,
            }
        }
    }

    /// Pushes a slot back onto the free list.
    ///
    /// O(1), lock-free, no syscalls.
    ///
    /// # Safety
    /// `payload` must come from [`allocate`](Self::allocate) on this
    /// same pool and must not already have been freed. Debug builds
    /// verify both; release builds do not, since the latency contract
    /// forbids a hot-path check.
    #[inline]
    pub unsafe fn deallocate(&self, payload: NonNull<T>) {
        #[cfg(debug_assertions)]
        self.mark_freed(payload.as_ptr().cast());

        let node = payload.as_ptr().cast::<FreeNode>();
        let mut head = self.free_head.0.load(Ordering::Acquire);
        loop {
            (*node).next = head;
            match self.free_head.0.compare_exchange_weak(
                head,
                node,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => head = observed,
            }
        }
        self.stats.record_deallocation();
    }

    /// Number of slots the pool was built with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Effective per-slot size in bytes, a cache-line multiple.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Hot-path counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Slots currently handed out. Approximate while other threads are
    /// mutating the pool.
    pub fn in_use(&self) -> usize {
        self.stats.in_use() as usize
    }

    /// Free slots remaining. Approximate while other threads are
    /// mutating the pool.
    pub fn available(&self) -> usize {
        self.capacity - self.in_use().min(self.capacity)
    }

    #[cfg(debug_assertions)]
    fn slot_index(&self, slot: *mut u8) -> usize {
        let base = self.storage.as_ptr() as usize;
        let addr = slot as usize;
        assert!(
            addr >= base && addr < base + self.capacity * self.slot_size,
            "pointer is not from this pool"
        );
        let offset = addr - base;
        assert_eq!(offset % self.slot_size, 0, "pointer is not a slot start");
        offset / self.slot_size
    }

    #[cfg(debug_assertions)]
    fn mark_allocated(&self, slot: *mut u8) {
        let index = self.slot_index(slot);
        let was_live = self.slot_live[index].swap(true, Ordering::Relaxed);
        assert!(!was_live, "free list handed out a live slot {index}");
    }

    #[cfg(debug_assertions)]
    fn mark_freed(&self, slot: *mut u8) {
        let index = self.slot_index(slot);
        let was_live = self.slot_live[index].swap(false, Ordering::Relaxed);
        assert!(was_live, "double free of slot {index}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::topology;

    const MIB: usize = 1024 * 1024;

    /// Per-message payload the receive-side collaborators recycle.
    #[derive(Clone, Copy, Debug)]
    #[repr(C, align(64))]
    struct TickMsg {
        ts_ns: u64,
        seq: u64,
        instrument: u32,
        px: f64,
        qty: u32,
        side: u8,
    }

    fn test_arena(bytes: usize) -> Option<NumaArena> {
        if !topology::numa_available() {
            eprintln!("skipping: no queryable NUMA topology");
            return None;
        }
        Some(NumaArena::new(bytes, 0, false).unwrap())
    }

    #[test]
    fn exhausts_after_capacity() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 16).unwrap();
        let mut live = Vec::new();
        for _ in 0..16 {
            live.push(pool.allocate().expect("pool drained early"));
        }
        assert!(pool.allocate().is_none());
        assert_eq!(pool.in_use(), 16);
        assert_eq!(pool.available(), 0);
        for slot in live {
            unsafe { pool.deallocate(slot) };
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.available(), 16);
    }

    #[test]
    fn freed_address_is_reused() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 4).unwrap();
        let first = pool.allocate().unwrap();
        unsafe { pool.deallocate(first) };
        let again = pool.allocate().unwrap();
        assert_eq!(first.as_ptr(), again.as_ptr());
        unsafe { pool.deallocate(again) };
    }

    #[test]
    fn exhausted_pool_stays_consistent() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 4).unwrap();
        let live: Vec<_> = (0..4).map(|_| pool.allocate().unwrap()).collect();

        for _ in 0..3 {
            assert!(pool.allocate().is_none());
        }
        assert_eq!(pool.stats().exhaustions(), 3);

        // The free list still works after repeated empty pops.
        unsafe { pool.deallocate(live[3]) };
        let replacement = pool.allocate().unwrap();
        assert_eq!(replacement.as_ptr(), live[3].as_ptr());

        unsafe {
            pool.deallocate(replacement);
            for slot in &live[..3] {
                pool.deallocate(*slot);
            }
        }
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn payload_survives_round_trip() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 4).unwrap();
        let slot = pool.allocate().unwrap();
        unsafe {
            slot.as_ptr().write(TickMsg {
                ts_ns: 1,
                seq: 42,
                instrument: 7,
                px: 101.25,
                qty: 10,
                side: b'B',
            });
            let msg = *slot.as_ptr();
            assert_eq!(msg.seq, 42);
            assert_eq!(msg.side, b'B');
            pool.deallocate(slot);
        }
    }

    // The end-to-end shape a receive loop relies on: full drain, spacing,
    // exhaustion signal, LIFO reuse of the first returned slot.
    #[test]
    fn hot_path_scenario() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::with_slot_size(&arena, 16, 64).unwrap();
        assert_eq!(pool.slot_size(), 64);

        let slots: Vec<_> = (0..16).map(|_| pool.allocate().unwrap()).collect();
        let mut addrs: Vec<usize> = slots.iter().map(|p| p.as_ptr() as usize).collect();
        let unique: HashSet<usize> = addrs.iter().copied().collect();
        assert_eq!(unique.len(), 16);

        addrs.sort_unstable();
        for pair in addrs.windows(2) {
            assert_eq!(pair[1] - pair[0], 64);
        }

        assert!(pool.allocate().is_none());

        unsafe { pool.deallocate(slots[0]) };
        let reused = pool.allocate().unwrap();
        assert_eq!(reused.as_ptr(), slots[0].as_ptr());

        unsafe {
            pool.deallocate(reused);
            for slot in &slots[1..] {
                pool.deallocate(*slot);
            }
        }
    }

    #[test]
    fn rejects_undersized_arena() {
        let Some(arena) = test_arena(4096) else { return };
        let err = SlotPool::<TickMsg>::new(&arena, 1024).unwrap_err();
        assert!(matches!(err, MemError::ArenaTooSmall { .. }));
    }

    #[test]
    fn slot_size_covers_payload_and_link() {
        // Requested headroom below the payload size must not shrink the slot.
        let Some(arena) = test_arena(MIB) else { return };
        let narrow: SlotPool<TickMsg> = SlotPool::with_slot_size(&arena, 8, 1).unwrap();
        assert_eq!(narrow.slot_size(), 64);
        drop(narrow);

        let Some(padded_arena) = test_arena(MIB) else { return };
        let padded: SlotPool<TickMsg> = SlotPool::with_slot_size(&padded_arena, 8, 100).unwrap();
        assert_eq!(padded.slot_size(), 128);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn zero_capacity_panics() {
        let Some(arena) = test_arena(MIB) else {
            panic!("capacity check skipped: no NUMA topology")
        };
        let _ = SlotPool::<TickMsg>::new(&arena, 0);
    }

    #[test]
    fn randomized_churn_matches_model() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 32).unwrap();
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut live: Vec<NonNull<TickMsg>> = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();

        for _ in 0..10_000 {
            if rng.random_bool(0.5) {
                match pool.allocate() {
                    Some(slot) => {
                        assert!(
                            seen.insert(slot.as_ptr() as usize),
                            "address handed out twice"
                        );
                        live.push(slot);
                    }
                    None => assert_eq!(live.len(), 32),
                }
            } else if !live.is_empty() {
                let index = rng.random_range(0..live.len());
                let slot = live.swap_remove(index);
                seen.remove(&(slot.as_ptr() as usize));
                unsafe { pool.deallocate(slot) };
            }
            assert!(live.len() <= pool.capacity());
            assert_eq!(pool.in_use(), live.len());
        }

        for slot in live {
            unsafe { pool.deallocate(slot) };
        }
    }

    #[test]
    fn concurrent_allocation_yields_distinct_slots() {
        let Some(arena) = test_arena(MIB) else { return };
        let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 64).unwrap();

        let grabbed: Vec<Vec<usize>> = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|_| {
                        let mut local = Vec::new();
                        while let Some(slot) = pool.allocate() {
                            local.push(slot.as_ptr() as usize);
                        }
                        local
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        let all: Vec<usize> = grabbed.into_iter().flatten().collect();
        assert_eq!(all.len(), 64);
        let unique: HashSet<usize> = all.iter().copied().collect();
        assert_eq!(unique.len(), 64);
        assert_eq!(pool.in_use(), 64);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn live_count_tracks_history(ops in prop::collection::vec(any::<bool>(), 1..200)) {
            let Some(arena) = test_arena(MIB) else { return Ok(()) };
            let pool: SlotPool<TickMsg> = SlotPool::new(&arena, 8).unwrap();
            let mut live = Vec::new();
            let (mut allocs, mut deallocs) = (0u64, 0u64);

            for op in ops {
                if op {
                    if let Some(slot) = pool.allocate() {
                        live.push(slot);
                        allocs += 1;
                    }
                } else if let Some(slot) = live.pop() {
                    unsafe { pool.deallocate(slot) };
                    deallocs += 1;
                }
                prop_assert!(live.len() <= pool.capacity());
                prop_assert_eq!(pool.in_use() as u64, allocs - deallocs);
            }

            for slot in live {
                unsafe { pool.deallocate(slot) };
            }
        }
    }
}
