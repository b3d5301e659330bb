//! # snabbmem configuration
//!
//! Hierarchical configuration for arena and pool construction and the
//! telemetry around them.
//!
//! ## Features
//! - **Single source of truth** for every construction-time parameter
//! - **Validation** before any memory is reserved
//! - **Environment awareness** via `SNABBMEM_ENV` overlays

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod memory;
mod telemetry;
mod topology;
mod validation;

pub use error::ConfigError;
pub use memory::{ArenaConfig, MemoryConfig, PoolConfig};
pub use telemetry::TelemetryConfig;
pub use topology::TopologyConfig;

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct SnabbmemConfig {
    /// Arena and slot pool sizing.
    #[serde(default)]
    #[validate(nested)]
    pub memory: MemoryConfig,

    /// Thread placement.
    #[serde(default)]
    #[validate(nested)]
    pub topology: TopologyConfig,

    /// Logging and metrics.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl SnabbmemConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/snabbmem.yaml`
    /// 3. `config/<environment>.yaml`, chosen by `SNABBMEM_ENV`
    /// 4. `SNABBMEM_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SnabbmemConfig::default()));

        if Path::new("config/snabbmem.yaml").exists() {
            figment = figment.merge(Yaml::file("config/snabbmem.yaml"));
        }

        let env = std::env::var("SNABBMEM_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        figment
            .merge(Env::prefixed("SNABBMEM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(Self::validated)
    }

    /// Load configuration from a specific path, environment overrides
    /// still applied on top.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SNABBMEM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(Self::validated)
    }

    fn validated(config: Self) -> Result<Self, ConfigError> {
        config.validate()?;
        config.topology.check_against_host()?;
        Ok(config)
    }
}
