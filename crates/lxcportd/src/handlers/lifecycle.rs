//! Commands that change whether a container exists or runs.

use tracing::{debug, error, warn};

use crate::marshal::Arguments;
use crate::native::CreateRequest;
use crate::reply::{Payload, Reply};
use crate::session::Session;
use crate::term::Term;

use super::{CommandError, HANDLER_TARGET, bound};

/// `create(Template, BdevType, BdevSpec, Flags, Argv)`.
///
/// Backing store options are accepted for shape but never forwarded; the
/// library receives a null pointer. Templates are chatty, so standard output is
/// pointed at the null device while the native call runs.
pub fn create(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let template = args.required_string()?;
    let bdev_type = args.optional_string()?;
    args.skip()?;
    let flags = args.integer()?;
    let argv = args.optional_argv()?;

    let request = CreateRequest {
        template: &template,
        bdev_type: bdev_type.as_deref(),
        flags,
        argv: argv.as_ref(),
    };

    let silenced = match session.silence_output() {
        Ok(guard) => guard,
        Err(error) => {
            warn!(target: HANDLER_TARGET, %error, "cannot silence output; create not attempted");
            return Ok(Reply::boolean(false));
        }
    };
    let created = container.create(&request);
    if let Err(error) = silenced.restore() {
        error!(target: HANDLER_TARGET, %error, "output not restored after create");
    }

    debug!(
        target: HANDLER_TARGET,
        template = %template.to_string_lossy(),
        created,
        "create finished"
    );
    Ok(Reply::boolean(created))
}

/// `destroy()`.
pub fn destroy(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    Ok(Reply::boolean(bound(session)?.destroy()))
}

/// `start(UseInit, Argv)`: runs the container in a supervised child.
///
/// One extra reference is taken before the child is spawned and kept in the
/// session on the child's behalf. The reply carries the child's pid and does
/// not wait for the container to come up.
pub fn start(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let handle = session.handle().ok_or(CommandError::NoHandle)?;
    let mut args = Arguments::new(terms);
    let use_init = args.integer()?;
    let argv = args.optional_argv()?;

    let reference = handle.acquire().ok_or(CommandError::ReferenceRefused)?;
    let container = handle.container();
    let mut worker = || container.start(use_init, argv.as_ref());

    match session.supervisor().spawn(&mut worker) {
        Ok(pid) => {
            debug!(target: HANDLER_TARGET, pid, use_init, "container start delegated");
            session.adopt(pid, reference);
            Ok(Reply::ok_value(Payload::Integer(i64::from(pid))))
        }
        Err(code) => {
            warn!(target: HANDLER_TARGET, code = code.code(), "failed to spawn start worker");
            drop(reference);
            Ok(Reply::errno(code))
        }
    }
}

/// `stop()`: kills the container and releases one started child's reference.
pub fn stop(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    let stopped = bound(session)?.stop();
    if let Some(pid) = session.release_latest() {
        debug!(target: HANDLER_TARGET, pid, "released reference held for started child");
    }
    Ok(match stopped {
        Ok(()) => Reply::ok(),
        Err(code) => Reply::errno(code),
    })
}

/// `shutdown(Timeout)`: negative timeouts never reach the library.
pub fn shutdown(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let timeout = args.integer()?;
    if timeout < 0 {
        return Err(CommandError::out_of_range("timeout", timeout));
    }
    Ok(Reply::boolean(container.shutdown(timeout)))
}
