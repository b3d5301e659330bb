//! Allocation counters for pool occupancy reporting.
//!
//! One relaxed `fetch_add` per hot-path operation. Derived figures are
//! approximate while other threads are mutating the pool.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a [`crate::pool::SlotPool`].
#[derive(Debug, Default)]
pub struct PoolStats {
    allocations: AtomicU64,
    deallocations: AtomicU64,
    exhaustions: AtomicU64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_deallocation(&self) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exhaustion(&self) {
        self.exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    /// Total successful allocations since construction.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Total deallocations since construction.
    pub fn deallocations(&self) -> u64 {
        self.deallocations.load(Ordering::Relaxed)
    }

    /// Times `allocate` found the free list empty.
    pub fn exhaustions(&self) -> u64 {
        self.exhaustions.load(Ordering::Relaxed)
    }

    /// Slots currently handed out.
    pub fn in_use(&self) -> u64 {
        self.allocations().saturating_sub(self.deallocations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = PoolStats::new();
        assert_eq!(stats.allocations(), 0);
        assert_eq!(stats.deallocations(), 0);
        assert_eq!(stats.exhaustions(), 0);
        assert_eq!(stats.in_use(), 0);
    }

    #[test]
    fn in_use_tracks_both_directions() {
        let stats = PoolStats::new();
        for _ in 0..100 {
            stats.record_allocation();
        }
        for _ in 0..40 {
            stats.record_deallocation();
        }
        stats.record_exhaustion();

        assert_eq!(stats.allocations(), 100);
        assert_eq!(stats.deallocations(), 40);
        assert_eq!(stats.exhaustions(), 1);
        assert_eq!(stats.in_use(), 60);
    }
}
