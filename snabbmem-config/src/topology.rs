//! Thread placement parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigError;

/// Thread pinning configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, Default)]
pub struct TopologyConfig {
    /// CPU the hot-path thread is pinned to; `None` leaves scheduling to
    /// the kernel.
    #[serde(default)]
    pub pin_cpu: Option<usize>,
}

impl TopologyConfig {
    /// Rejects a pin target the host does not have.
    pub(crate) fn check_against_host(&self) -> Result<(), ConfigError> {
        if let Some(cpu) = self.pin_cpu {
            let cpus = num_cpus::get();
            if cpu >= cpus {
                return Err(ConfigError::UnknownCpu { cpu, cpus });
            }
        }
        Ok(())
    }
}
