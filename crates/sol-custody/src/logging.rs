//! Structured logging bootstrap for services embedding the custody library.
//!
//! Events go to stderr through a `tracing` subscriber with `RUST_LOG`
//! filtering, as pretty text or JSON lines.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CustodyError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

impl LogFormat {
    /// `"json"` (any case) selects JSON; everything else is pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `default_level` applies when `RUST_LOG` is unset, e.g. `"info"` or
/// `"sol_custody=debug"`. If a global subscriber is already installed it is
/// left in place and the call succeeds, so this may be called repeatedly.
/// Only an unparseable filter is an error.
pub fn init_logging(default_level: &str, format: LogFormat) -> Result<(), CustodyError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| CustodyError::Config(format!("log filter {default_level:?}: {e}")))?;

    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .try_init(),
    };
    match installed {
        Ok(()) => tracing::info!(?format, "logging initialized"),
        Err(e) => tracing::debug!(error = %e, "keeping the existing subscriber"),
    }
    Ok(())
}
