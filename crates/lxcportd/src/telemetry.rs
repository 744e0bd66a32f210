//! Diagnostics for the port.
//!
//! Standard output is the reply channel, so every event goes to standard
//! error. The subscriber is installed once per process; the port calls
//! [`initialise`] during bootstrap before any container is opened.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use lxcport_config::{Config, LogFormat};

/// Log target for telemetry set-up events.
pub(crate) const TELEMETRY_TARGET: &str = "lxcportd::telemetry";

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Proof that the diagnostics subscriber is in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors raised while setting up diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid `tracing` filter directive.
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },
    /// Some other subscriber already owns the process.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the stderr subscriber described by `config`.
///
/// Only the first call has any effect. Later calls hand back a handle and leave
/// the installed subscriber alone.
///
/// # Errors
///
/// Fails when the filter expression is invalid or a subscriber was installed
/// by something other than this function.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| {
            let subscriber = build_subscriber(config)?;
            tracing::subscriber::set_global_default(subscriber)
                .map_err(TelemetryError::Subscriber)?;
            tracing::debug!(
                target: TELEMETRY_TARGET,
                filter = config.log_filter(),
                format = %config.log_format(),
                "telemetry installed"
            );
            Ok(())
        })
        .map(|_| TelemetryHandle)
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

fn build_subscriber(config: &Config) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError> {
    let format = config.log_format();
    let builder = fmt::Subscriber::builder()
        .with_env_filter(parse_filter(config.log_filter())?)
        .with_target(true)
        .with_writer(io::stderr)
        // Colour codes would corrupt JSON records and captured stderr.
        .with_ansi(!format.is_structured() && io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    Ok(match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}
