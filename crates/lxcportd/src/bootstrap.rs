//! Port bootstrap orchestration.

use std::ffi::{CString, NulError};
use std::io::{BufRead, Write};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use lxcport_config::Config;

use crate::dispatch::{CommandTable, Dispatcher, RegistryError};
use crate::native::{ContainerHandle, ContainerLibrary};
use crate::session::Session;
use crate::supervisor::Supervisor;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{self, TransportError};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader {
    /// Loads the port configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The command table is inconsistent.
    #[error("invalid command table: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// A configured name cannot be passed to the native library.
    #[error("{field} contains a NUL byte: {source}")]
    InvalidName {
        /// Configuration field holding the name.
        field: &'static str,
        /// Underlying conversion error.
        #[source]
        source: NulError,
    },
    /// The native library could not open the configured container.
    #[error("container {name} could not be opened")]
    ContainerUnavailable {
        /// Configured container name.
        name: String,
    },
}

/// A bootstrapped port, ready to serve its channel.
#[derive(Debug)]
pub struct Port {
    config: Config,
    dispatcher: Dispatcher,
    session: Session,
    telemetry: TelemetryHandle,
}

impl Port {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The session commands run against.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Serves the channel until end of input, then applies the exit policy.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] that ended the loop early. The exit
    /// policy is applied either way.
    pub fn serve<R, W>(self, input: R, output: W) -> Result<usize, TransportError>
    where
        R: BufRead,
        W: Write,
    {
        let Self {
            config,
            dispatcher,
            mut session,
            ..
        } = self;
        let served = transport::serve(input, output, &dispatcher, &mut session);
        session.finish(config.on_exit());
        served
    }
}

/// Bootstraps the port using the supplied collaborators.
///
/// # Errors
///
/// Fails when configuration, telemetry, or the command table cannot be set
/// up, or when a configured container cannot be opened.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    library: Box<dyn ContainerLibrary>,
    supervisor: Box<dyn Supervisor>,
) -> Result<Port, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let table = CommandTable::standard().map_err(|source| BootstrapError::Registry { source })?;
    let session = bind_session(&config, library, supervisor)?;

    info!(
        target: BOOTSTRAP_TARGET,
        container = config.container(),
        commands = table.len(),
        "port ready"
    );

    Ok(Port {
        config,
        dispatcher: Dispatcher::new(table),
        session,
        telemetry,
    })
}

/// Builds a session, binding the configured container if there is one.
///
/// # Errors
///
/// Fails when a configured name contains NUL or the library cannot open the
/// container.
pub fn bind_session(
    config: &Config,
    library: Box<dyn ContainerLibrary>,
    supervisor: Box<dyn Supervisor>,
) -> Result<Session, BootstrapError> {
    let Some(name) = config.container() else {
        return Ok(Session::new(library, supervisor));
    };

    let container_name = native_name("container", name)?;
    let lxc_path = config
        .lxc_path()
        .map(|path| native_name("lxc_path", path))
        .transpose()?;

    let container = library
        .open(&container_name, lxc_path.as_deref())
        .ok_or_else(|| BootstrapError::ContainerUnavailable {
            name: name.to_owned(),
        })?;

    Ok(Session::new(library, supervisor).with_handle(ContainerHandle::new(container)))
}

fn native_name(field: &'static str, value: &str) -> Result<CString, BootstrapError> {
    CString::new(value).map_err(|source| BootstrapError::InvalidName { field, source })
}
