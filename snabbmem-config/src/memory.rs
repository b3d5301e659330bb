//! Arena and pool sizing parameters.
//!
//! Everything here is consumed once, at startup, before the hot path
//! exists: the arena reserves `arena.size_bytes` on `arena.numa_node`
//! and the pool partitions it into `pool.capacity` slots.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Memory subsystem configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct MemoryConfig {
    /// Backing arena reservation.
    #[serde(default)]
    #[validate(nested)]
    pub arena: ArenaConfig,

    /// Slot pool built over the arena.
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

/// NUMA-local arena reservation parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ArenaConfig {
    /// Region size in bytes; rounded up to whole pages at reservation.
    #[serde(default = "default_arena_bytes")]
    #[validate(range(min = 4096usize, max = 17_179_869_184usize))]
    pub size_bytes: usize,

    /// NUMA node the region is bound to.
    #[serde(default)]
    pub numa_node: usize,

    /// Advise the kernel to promote the region to huge pages.
    #[serde(default = "default_true")]
    pub prefer_huge_pages: bool,
}

fn default_arena_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size_bytes: default_arena_bytes(),
            numa_node: 0,
            prefer_huge_pages: default_true(),
        }
    }
}

/// Slot pool parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PoolConfig {
    /// Number of pre-linked slots; sized for the maximum expected
    /// live-object count.
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, max = 16_777_216))]
    pub capacity: usize,

    /// Requested payload bytes per slot; raised to a cache-line multiple
    /// at construction.
    #[serde(default = "default_slot_bytes")]
    #[validate(range(min = 1, max = 65536))]
    pub slot_bytes: usize,
}

fn default_capacity() -> usize {
    65536
}

fn default_slot_bytes() -> usize {
    64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            slot_bytes: default_slot_bytes(),
        }
    }
}
