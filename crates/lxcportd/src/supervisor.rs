//! Process isolation for blocking container starts.
//!
//! Starting a container blocks the calling process for the container's whole
//! lifetime, so the port runs it in a forked child and answers immediately
//! with the child's pid. The child never returns to the dispatch loop.

use nix::unistd::{ForkResult, fork};
use tracing::{debug, error};

use crate::reply::ErrnoCode;

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// Exit status of a child whose blocking start returned.
pub const CHILD_FAILURE_STATUS: i32 = 1;

/// Spawns isolated workers.
pub trait Supervisor {
    /// Runs `worker` in a new process and returns that process's pid.
    ///
    /// The worker's own return value is only observed inside the new process.
    ///
    /// # Errors
    ///
    /// Returns the native error code when no process could be created.
    fn spawn(&self, worker: &mut dyn FnMut() -> bool) -> Result<i32, ErrnoCode>;
}

/// Supervisor backed by `fork(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkSupervisor;

impl Supervisor for ForkSupervisor {
    fn spawn(&self, worker: &mut dyn FnMut() -> bool) -> Result<i32, ErrnoCode> {
        // SAFETY: the port is single-threaded, and the child only runs the
        // worker before leaving through `_exit`.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!(target: SUPERVISOR_TARGET, pid = child.as_raw(), "spawned worker");
                Ok(child.as_raw())
            }
            Ok(ForkResult::Child) => run_child(worker),
            Err(errno) => Err(errno.into()),
        }
    }
}

fn run_child(worker: &mut dyn FnMut() -> bool) -> ! {
    let started = worker();
    error!(
        target: SUPERVISOR_TARGET,
        started,
        "container init returned; terminating worker"
    );
    // SAFETY: `_exit` skips exit handlers and never flushes stdio buffers
    // inherited from the parent, which would duplicate its pending output.
    unsafe { libc::_exit(CHILD_FAILURE_STATUS) }
}
