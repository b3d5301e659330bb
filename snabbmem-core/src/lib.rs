//! # snabbmem-core
//!
//! Deterministic-latency memory subsystem: a NUMA-local arena plus a
//! lock-free, fixed-size slot pool for hot-path object reuse.
//! Built with safety, performance, and maintainability as primary design constraints.
//!
//! ### Expectations (Production):
//! - All kernel interaction front-loaded into arena construction
//! - Zero syscalls and zero heap traffic on the allocate/deallocate path
//! - Lock-free synchronization primitives
//!
//! ### Key Submodules:
//! - `arena`: NUMA-bound, page-locked, prefaulted backing memory
//! - `pool`: Treiber-stack slot pool with an intrusive free list
//! - `return_queue`: bounded MPSC return channel for cross-thread frees
//! - `topology`: thread pinning and NUMA node discovery
//!
//! ### Future:
//! - Tagged free-list heads for multi-owner pools
//! - Explicit hugetlbfs-backed arenas

pub mod arena;
pub mod error;
pub mod pool;
pub mod return_queue;
pub mod stats;
pub mod topology;

pub mod prelude {
    pub use crate::arena::*;
    pub use crate::error::*;
    pub use crate::pool::*;
    pub use crate::return_queue::*;
    pub use crate::stats::*;
    pub use crate::topology::*;
}

pub use error::MemError;
