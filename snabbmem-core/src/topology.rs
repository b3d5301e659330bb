//! ## snabbmem-core::topology
//! **Thread pinning and NUMA node discovery**
//!
//! Latency wants compute and memory on the same node: pin the thread
//! first, resolve its node, then size the arena on that node. Pinning
//! is best-effort: correctness never depends on it, only tail latency.

#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::io;
#[cfg(target_os = "linux")]
use std::path::Path;

use tracing::warn;

use crate::error::MemError;

#[cfg(target_os = "linux")]
const NODE_ROOT: &str = "/sys/devices/system/node";
#[cfg(target_os = "linux")]
const CPU_ROOT: &str = "/sys/devices/system/cpu";

/// Whether the host exposes a queryable NUMA topology.
pub fn numa_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(NODE_ROOT).join("node0").exists()
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Number of NUMA nodes the host exposes, zero when unqueryable.
pub fn num_numa_nodes() -> usize {
    #[cfg(target_os = "linux")]
    {
        let Ok(entries) = fs::read_dir(NODE_ROOT) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("node"))
                    .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
            })
            .count()
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

/// Resolves the NUMA node `cpu` belongs to, so arena and pool land on
/// memory local to the executing core.
pub fn numa_node_of_cpu(cpu: usize) -> Result<usize, MemError> {
    #[cfg(target_os = "linux")]
    {
        let dir = format!("{CPU_ROOT}/cpu{cpu}");
        let entries = fs::read_dir(&dir)
            .map_err(|err| MemError::NumaUnavailable(format!("{dir}: {err}")))?;
        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_prefix("node")) {
                if let Ok(node) = id.parse::<usize>() {
                    return Ok(node);
                }
            }
        }
        Err(MemError::NumaUnavailable(format!(
            "cpu {cpu} has no node entry"
        )))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cpu;
        Err(MemError::NumaUnavailable("not a linux host".into()))
    }
}

/// Pins the calling thread to exactly `cpu`.
///
/// Best effort: a denied or unsupported request leaves the thread where
/// it was and logs a warning, since only latency depends on placement.
pub fn pin_to_cpu(cpu: usize) {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: a zeroed cpu_set_t is the empty set; CPU_ZERO/CPU_SET
        // only write into the set handed to them.
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(cpu, &mut set);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                warn!(
                    cpu,
                    error = %io::Error::last_os_error(),
                    "sched_setaffinity denied, thread left unpinned"
                );
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        warn!(cpu, "thread pinning unsupported on this platform");
    }
}

/// CPU the calling thread is currently executing on.
pub fn current_cpu() -> Option<usize> {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: sched_getcpu takes no arguments and only returns an id.
        let cpu = unsafe { libc::sched_getcpu() };
        (cpu >= 0).then(|| cpu as usize)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
