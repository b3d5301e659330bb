//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;
use validator::ValidationErrors;

/// Unified configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Requested configuration file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// A pinned CPU the host does not have.
    #[error("pin_cpu {cpu} out of range, host has {cpus} CPUs")]
    UnknownCpu { cpu: usize, cpus: usize },

    /// One or more fields failed validation.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),

    /// Figment merge or extract failure.
    #[error("configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),

    /// Filesystem failure while loading.
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}
