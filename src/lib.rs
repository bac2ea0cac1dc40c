//! camsnap - record movies from attached capture devices.
//!
//! This is the library crate behind the `camsnap` binary. It provides device
//! discovery, the capture-session state machine and the runner that drives a
//! single recording from start delay to finalization.

pub mod capture;
pub mod cli;
pub mod recorder;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration, threaded in from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Debug-level logging for camsnap itself
    pub verbose: bool,
}

impl LogConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "camsnap=debug,camsnap_lib=debug"
        } else {
            "camsnap=warn,camsnap_lib=warn"
        }
    }
}

/// Initialize tracing/logging on stderr
pub fn init_tracing(config: LogConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting camsnap v{}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_log_level() {
        assert!(LogConfig { verbose: true }.default_filter().contains("debug"));
        assert!(LogConfig::default().default_filter().contains("warn"));
    }
}
