//! ## snabbmem-telemetry::metrics
//! **Prometheus export of pool and arena occupancy**
//!
//! The hot path never touches the registry: gauges are set from relaxed
//! counter snapshots whenever the owning thread calls
//! [`MetricsRecorder::observe_pool`], typically right after its
//! return-queue drain.

use prometheus::{IntGauge, Registry};

use snabbmem_core::arena::NumaArena;
use snabbmem_core::pool::SlotPool;

#[derive(Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub pool_slots_in_use: IntGauge,
    pub pool_allocations_total: IntGauge,
    pub pool_deallocations_total: IntGauge,
    pub pool_exhausted_total: IntGauge,
    pub arena_locked_bytes: IntGauge,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();

        let pool_slots_in_use =
            IntGauge::new("snabbmem_pool_slots_in_use", "Slots currently handed out").unwrap();
        let pool_allocations_total = IntGauge::new(
            "snabbmem_pool_allocations_total",
            "Successful slot allocations",
        )
        .unwrap();
        let pool_deallocations_total = IntGauge::new(
            "snabbmem_pool_deallocations_total",
            "Slots returned to the free list",
        )
        .unwrap();
        let pool_exhausted_total = IntGauge::new(
            "snabbmem_pool_exhausted_total",
            "Allocations that found the pool empty",
        )
        .unwrap();
        let arena_locked_bytes = IntGauge::new(
            "snabbmem_arena_locked_bytes",
            "Bytes reserved and prefaulted by the arena",
        )
        .unwrap();

        registry
            .register(Box::new(pool_slots_in_use.clone()))
            .unwrap();
        registry
            .register(Box::new(pool_allocations_total.clone()))
            .unwrap();
        registry
            .register(Box::new(pool_deallocations_total.clone()))
            .unwrap();
        registry
            .register(Box::new(pool_exhausted_total.clone()))
            .unwrap();
        registry
            .register(Box::new(arena_locked_bytes.clone()))
            .unwrap();

        Self {
            registry,
            pool_slots_in_use,
            pool_allocations_total,
            pool_deallocations_total,
            pool_exhausted_total,
            arena_locked_bytes,
        }
    }

    /// Snapshot a pool's counters into the gauges.
    pub fn observe_pool<T: Copy>(&self, pool: &SlotPool<'_, T>) {
        let stats = pool.stats();
        self.pool_slots_in_use.set(pool.in_use() as i64);
        self.pool_allocations_total.set(stats.allocations() as i64);
        self.pool_deallocations_total
            .set(stats.deallocations() as i64);
        self.pool_exhausted_total.set(stats.exhaustions() as i64);
    }

    /// Record the arena's resident reservation.
    pub fn observe_arena(&self, arena: &NumaArena) {
        self.arena_locked_bytes.set(arena.size() as i64);
    }

    /// Render the registry in the text exposition format.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
