//! ## snabbmem-core::arena
//! **NUMA-local backing memory with locked, prefaulted pages**
//!
//! All OS interaction happens here, once, at construction: reservation,
//! node binding, memory locking, huge-page advice and prefaulting. After
//! [`NumaArena::new`] returns, nothing built on top of the arena ever
//! crosses into kernel space again.

use std::io;
use std::ptr::{self, NonNull};
use std::sync::Once;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::MemError;
use crate::topology;

/// Cache line size assumed by slot layout and head padding.
pub const CACHE_LINE: usize = 64;

static PAGE_SIZE: Lazy<usize> =
    Lazy::new(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize });

static LOCK_MEMORY: Once = Once::new();

/// System base page size.
pub fn page_size() -> usize {
    *PAGE_SIZE
}

pub(crate) fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Locks current and future pages of the whole process into RAM.
///
/// Process-scoped and idempotent: only the first call issues `mlockall`,
/// later calls are no-ops. Denial (typically `RLIMIT_MEMLOCK`) is logged
/// and tolerated; the arena still works, it just may page.
pub fn lock_process_memory() {
    LOCK_MEMORY.call_once(|| {
        // SAFETY: mlockall takes flags only and touches no caller memory.
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc != 0 {
            warn!(
                error = %io::Error::last_os_error(),
                "mlockall denied, resident pages are not guaranteed"
            );
        }
    });
}

/// A contiguous, page-locked, NUMA-bound region of anonymous memory.
///
/// The arena exclusively owns its mapping and releases it on drop. Pools
/// borrow the arena, so the region cannot be unmapped while any pool
/// built over it is alive.
#[derive(Debug)]
pub struct NumaArena {
    base: NonNull<u8>,
    size: usize,
    node: usize,
}

// SAFETY: `base`, `size` and `node` are immutable after construction.
// The bytes behind `base` are only mutated through pools, which carry
// their own synchronization contract.
unsafe impl Send for NumaArena {}
unsafe impl Sync for NumaArena {}

impl NumaArena {
    /// Reserves `size_bytes` (rounded up to whole pages) on `numa_node`.
    ///
    /// The region is locked against paging (best effort), optionally
    /// advised towards transparent huge pages, and prefaulted so that no
    /// first-touch fault remains by the time this returns.
    pub fn new(
        size_bytes: usize,
        numa_node: usize,
        prefer_huge_pages: bool,
    ) -> Result<Self, MemError> {
        if !topology::numa_available() {
            return Err(MemError::NumaUnavailable(
                "no queryable node topology".into(),
            ));
        }
        let nodes = topology::num_numa_nodes();
        if numa_node >= nodes {
            return Err(MemError::NumaUnavailable(format!(
                "node {numa_node} not present (topology has {nodes})"
            )));
        }

        lock_process_memory();

        let size = round_up(size_bytes.max(1), page_size());
        // SAFETY: anonymous private mapping, no fd, offset unused.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(MemError::OutOfMemory {
                bytes: size,
                node: numa_node,
            });
        }
        let base = raw.cast::<u8>();

        bind_to_node(base, size, numa_node);

        if prefer_huge_pages {
            advise_huge_pages(base, size);
        }

        // Touch every page once so no demand fault is left for later.
        let mut offset = 0;
        while offset < size {
            // SAFETY: offset < size, inside the mapping reserved above.
            unsafe { ptr::write_volatile(base.add(offset), 0) };
            offset += page_size();
        }

        debug!(
            bytes = size,
            node = numa_node,
            huge_pages = prefer_huge_pages,
            "arena mapped and prefaulted"
        );

        Ok(Self {
            // SAFETY: mmap success was checked above.
            base: unsafe { NonNull::new_unchecked(base) },
            size,
            node: numa_node,
        })
    }

    /// Start of the reserved region.
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Region size in bytes, always a whole number of pages.
    pub fn size(&self) -> usize {
        self.size
    }

    /// NUMA node the region is bound to.
    pub fn node(&self) -> usize {
        self.node
    }
}

impl Drop for NumaArena {
    fn drop(&mut self) {
        // SAFETY: base/size describe exactly the mapping created in `new`.
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.size) };
        if rc != 0 {
            warn!(
                error = %io::Error::last_os_error(),
                "munmap failed on arena teardown"
            );
        }
    }
}

// mbind(2) is not exposed by the libc crate; the mode constant comes
// from numaif.h.
#[cfg(target_os = "linux")]
const MPOL_PREFERRED: libc::c_int = 1;

/// Applies a preferred-node policy so prefaulting places pages on
/// `node`. Non-strict: under node-local pressure the kernel falls back
/// to a foreign node instead of failing the fault.
#[cfg(target_os = "linux")]
fn bind_to_node(base: *mut u8, size: usize, node: usize) {
    let mask_bits = 8 * std::mem::size_of::<libc::c_ulong>();
    if node >= mask_bits {
        warn!(node, "node id exceeds single-word nodemask, leaving policy unset");
        return;
    }
    let nodemask: libc::c_ulong = 1 << node;
    // SAFETY: base/size describe a live mapping owned by this process;
    // the nodemask outlives the call.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_mbind,
            base.cast::<libc::c_void>(),
            size as libc::c_ulong,
            MPOL_PREFERRED,
            &nodemask as *const libc::c_ulong,
            mask_bits as libc::c_ulong,
            0 as libc::c_uint,
        )
    };
    if rc != 0 {
        warn!(
            node,
            error = %io::Error::last_os_error(),
            "mbind rejected, memory may land off-node"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn bind_to_node(_base: *mut u8, _size: usize, _node: usize) {}

#[cfg(target_os = "linux")]
fn advise_huge_pages(base: *mut u8, size: usize) {
    // SAFETY: advising a live mapping; MADV_HUGEPAGE never invalidates it.
    let rc = unsafe { libc::madvise(base.cast(), size, libc::MADV_HUGEPAGE) };
    if rc != 0 {
        debug!(
            error = %io::Error::last_os_error(),
            "MADV_HUGEPAGE not honored"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_huge_pages(_base: *mut u8, _size: usize) {}
