// Logging module - Logging infrastructure
use crate::domain::error::{MuxError, MuxResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest payload rendered in full by [`payload`]
const PREVIEW_LIMIT: usize = 64;

/// Initialize logging system
///
/// `RUST_LOG` takes precedence; otherwise `level` is used, or `debug`
/// when `verbose` is set.
pub fn init_logging(level: &str, verbose: bool) -> MuxResult<()> {
    let fallback = if verbose { "debug" } else { level };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("sermux={},warn", fallback)))
        .map_err(|e| MuxError::Config {
            message: format!("Invalid log level '{}': {}", fallback, e),
        })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbose)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()
        .map_err(|e| MuxError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("Sermux logging system initialized");
    Ok(())
}

/// Render bytes for log lines as `len bytes "text" [hex]`.
pub fn payload(data: &[u8]) -> String {
    let shown = &data[..data.len().min(PREVIEW_LIMIT)];
    let ellipsis = if data.len() > PREVIEW_LIMIT { "..." } else { "" };
    format!(
        "{} bytes {:?}{} [{}{}]",
        data.len(),
        String::from_utf8_lossy(shown),
        ellipsis,
        hex::encode(shown),
        ellipsis
    )
}
