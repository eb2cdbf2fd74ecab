//! Tracing subscriber initialisation for binaries.
//!
//! Library code only emits events; installing a subscriber is left to the
//! process entry point.

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "management_endpoint=info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human readable events.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::UnknownFormat(value.to_owned())),
        }
    }
}

/// Errors raised while installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The requested format is not supported.
    #[error("unknown log format '{0}' (expected 'compact' or 'json')")]
    UnknownFormat(String),

    /// `RUST_LOG` or the default filter could not be parsed.
    #[error("invalid log filter")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber is already installed.
    #[error("log subscriber already installed")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG` when set and falls back to
/// [`DEFAULT_FILTER`].
///
/// # Errors
///
/// Returns [`LoggingError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_FILTER)?,
    };
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Compact => registry
            .with(fmt::layer().with_target(true).compact())
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().with_target(true).json())
            .try_init()?,
    }
    Ok(())
}
