//! ## snabbmem-telemetry::logging
//! **Tracing subscriber bootstrap**
//!
//! The allocator only emits through the `tracing` facade: warnings on
//! best-effort syscall denials, debug lines at arena construction. This
//! is the process-level subscriber those events land in.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct AllocLogger;

impl AllocLogger {
    /// Installs the global fmt subscriber, filter taken from `RUST_LOG`
    /// with an `info` fallback. Idempotent: if a subscriber is already
    /// installed the call is a no-op.
    pub fn init() {
        Self::init_with_filter("info");
    }

    /// Same, with an explicit fallback filter (typically the configured
    /// `telemetry.log_level`).
    pub fn init_with_filter(fallback: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn init_is_idempotent() {
        AllocLogger::init();
        AllocLogger::init_with_filter("debug");
        AllocLogger::init();
    }

    #[traced_test]
    #[test]
    fn warnings_reach_the_subscriber() {
        tracing::warn!("pool pressure high");
        assert!(logs_contain("pool pressure high"));
    }
}
