//! Per-channel dispatch context.

use std::fmt;
use std::os::fd::RawFd;

use lxcport_config::ExitPolicy;
use tracing::{info, warn};

use crate::native::{ContainerHandle, ContainerLibrary, HandleRef};
use crate::stdio::{SilenceError, SilencedStdout};
use crate::supervisor::Supervisor;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// A started child together with the reference held on its behalf.
#[derive(Debug)]
pub struct Supervised {
    pid: i32,
    _reference: HandleRef,
}

impl Supervised {
    /// Pid of the started child.
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }
}

/// State shared by every command on one channel.
///
/// At most one container is bound. References taken for started children
/// stay here until a `stop` releases them or the session finishes.
pub struct Session {
    handle: Option<ContainerHandle>,
    library: Box<dyn ContainerLibrary>,
    supervisor: Box<dyn Supervisor>,
    supervised: Vec<Supervised>,
    output_fd: Option<RawFd>,
}

impl Session {
    /// Creates a session with no bound container.
    #[must_use]
    pub fn new(library: Box<dyn ContainerLibrary>, supervisor: Box<dyn Supervisor>) -> Self {
        Self {
            handle: None,
            library,
            supervisor,
            supervised: Vec::new(),
            output_fd: None,
        }
    }

    /// Silences `fd` instead of standard output around noisy native calls.
    #[must_use]
    pub fn with_output_fd(mut self, fd: RawFd) -> Self {
        self.output_fd = Some(fd);
        self
    }

    /// Binds `handle`, replacing any container bound before.
    #[must_use]
    pub fn with_handle(mut self, handle: ContainerHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// The bound container, if any.
    #[must_use]
    pub fn handle(&self) -> Option<&ContainerHandle> {
        self.handle.as_ref()
    }

    /// The native library entry points.
    #[must_use]
    pub fn library(&self) -> &dyn ContainerLibrary {
        self.library.as_ref()
    }

    /// The worker spawner used by `start`.
    #[must_use]
    pub fn supervisor(&self) -> &dyn Supervisor {
        self.supervisor.as_ref()
    }

    /// Points the reply descriptor at the null device until the guard is
    /// restored.
    ///
    /// # Errors
    ///
    /// Fails when the descriptor cannot be redirected; it is then untouched.
    pub fn silence_output(&self) -> Result<SilencedStdout, SilenceError> {
        match self.output_fd {
            Some(fd) => SilencedStdout::engage_fd(fd),
            None => SilencedStdout::engage(),
        }
    }

    /// Records a started child and the reference kept alive for it.
    pub fn adopt(&mut self, pid: i32, reference: HandleRef) {
        self.supervised.push(Supervised {
            pid,
            _reference: reference,
        });
    }

    /// Releases the reference held for the most recently started child.
    ///
    /// Returns the pid it was held for, or `None` when nothing was held.
    pub fn release_latest(&mut self) -> Option<i32> {
        self.supervised.pop().map(|child| child.pid())
    }

    /// Children currently holding a reference.
    #[must_use]
    pub fn supervised(&self) -> &[Supervised] {
        &self.supervised
    }

    /// Applies the exit policy and releases every reference.
    pub fn finish(mut self, policy: ExitPolicy) {
        if policy.destroys_container() {
            if let Some(handle) = &self.handle {
                tear_down(handle);
            }
        }
        self.supervised.clear();
        self.handle = None;
    }
}

fn tear_down(handle: &ContainerHandle) {
    let container = handle.container();
    if container.is_running() {
        if let Err(code) = container.stop() {
            warn!(target: SESSION_TARGET, code = code.code(), "failed to stop container on exit");
        }
    }
    if container.destroy() {
        info!(target: SESSION_TARGET, "destroyed container on exit");
    } else {
        warn!(target: SESSION_TARGET, "failed to destroy container on exit");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("supervised", &self.supervised)
            .finish_non_exhaustive()
    }
}
