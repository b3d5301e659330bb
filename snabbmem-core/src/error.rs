use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemError {
    #[error("NUMA-local reservation of {bytes} bytes on node {node} failed")]
    OutOfMemory { bytes: usize, node: usize },

    #[error("NUMA topology unavailable: {0}")]
    NumaUnavailable(String),

    #[error("arena of {arena_bytes} bytes cannot hold {capacity} slots of {slot_bytes} bytes")]
    ArenaTooSmall {
        arena_bytes: usize,
        capacity: usize,
        slot_bytes: usize,
    },
}
