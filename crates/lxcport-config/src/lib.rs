//! Shared configuration for the LXC port.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then a
//! configuration file, then `LXCPORT_*` environment variables, then command
//! line flags. The port reads it once at startup; nothing here changes while
//! the channel is being served.

mod defaults;
mod exit_policy;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, default_exit_policy, default_log_filter, default_log_filter_string,
    default_log_format,
};
pub use exit_policy::{ExitPolicy, ExitPolicyParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved port configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LXCPORT")]
pub struct Config {
    /// Name of the container bound to the session. No handle is bound when
    /// this is absent and container commands answer with `einval`.
    #[serde(default)]
    pub container: Option<String>,
    /// Alternative LXC root holding container definitions.
    #[serde(default)]
    pub lxc_path: Option<String>,
    /// `tracing` filter expression applied to diagnostics on stderr.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for diagnostics.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Action applied to the bound container when the channel closes.
    #[serde(default = "default_exit_policy")]
    #[ortho_config(default = default_exit_policy())]
    pub on_exit: ExitPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            container: None,
            lxc_path: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            on_exit: default_exit_policy(),
        }
    }
}

impl Config {
    /// Name of the container to bind, if any.
    #[must_use]
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// Alternative LXC root, if any.
    #[must_use]
    pub fn lxc_path(&self) -> Option<&str> {
        self.lxc_path.as_deref()
    }

    /// Filter expression for the telemetry subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for the telemetry subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Exit policy for the bound container.
    #[must_use]
    pub const fn on_exit(&self) -> ExitPolicy {
        self.on_exit
    }
}
