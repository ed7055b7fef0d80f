//! Tracing subscriber bootstrap for binaries and tests embedding the crate.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{DaemonError, Result};

/// Initializes structured logging.
///
/// Filtering follows the `RUST_LOG` environment variable, defaulting to
/// `info`. Records emitted through the `log` facade are bridged into
/// tracing.
///
/// # Errors
/// Returns an error if a subscriber has already been installed.
pub fn init() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_log::LogTracer::init()
        .map_err(|e| DaemonError::LoggingInit(e.to_string()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| DaemonError::LoggingInit(e.to_string()))?;

    Ok(())
}

/// Initializes logging for tests; a no-op if already initialized.
pub fn init_test() {
    let _ = init();
}
