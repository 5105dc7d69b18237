//! Tracing subscriber setup

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, VoltcastError};

/// Default filter directive when `RUST_LOG` is unset
#[must_use]
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber: stderr, plus an ANSI-free append-mode
/// copy in `log_file` when given
///
/// # Errors
///
/// Returns [`VoltcastError::IoError`] if the log file cannot be opened and
/// [`VoltcastError::InvalidConfiguration`] if a subscriber is already set.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| VoltcastError::IoError {
                    message: format!("failed to open log file {}: {e}", path.display()),
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| VoltcastError::InvalidConfiguration(format!("logging already initialized: {e}")))
}
