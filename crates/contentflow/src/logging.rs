//! Subscriber setup for hosts embedding the engine.
//!
//! The workflow layer emits `tracing` spans; the persistence layer logs
//! through the `log` facade, which is bridged into the same subscriber.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,contentflow=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),

    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Fails if a subscriber or `log` logger is already installed.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(true));
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    tracing_log::LogTracer::init()?;

    tracing::debug!(?format, "Logging initialized");
    Ok(())
}
