//! # Structured Logging
//!
//! Text or JSON output through `tracing-subscriber`. `RUST_LOG` wins over the
//! configured level when set.

use std::sync::atomic::{AtomicBool, Ordering};

use config_rs::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter '{0}'")]
    InvalidFilter(String),

    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Initializes the logging system. Calling it again is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("{},tower_http=info", config.level))
            .map_err(|_| LoggingError::InvalidFilter(config.level.clone()))?,
    };

    let registry = Registry::default().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    installed.map_err(|e| LoggingError::Install(e.to_string()))
}
