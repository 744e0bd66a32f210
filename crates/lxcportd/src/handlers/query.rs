//! Read-only commands: listings and container accessors.

use tracing::debug;

use crate::listing;
use crate::marshal::{Arguments, Argv};
use crate::native::ListKind;
use crate::reply::{Payload, Reply};
use crate::session::Session;
use crate::term::Term;

use super::{CommandError, HANDLER_TARGET, bound};

fn list_kind(session: &Session, terms: &[Term], kind: ListKind) -> Result<Reply, CommandError> {
    let mut args = Arguments::new(terms);
    let path = args.optional_string()?;
    Ok(listing::list(session.library(), kind, path.as_deref()))
}

/// `list_active_containers(Path)`.
pub fn list_active_containers(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    list_kind(session, terms, ListKind::Active)
}

/// `list_all_containers(Path)`.
pub fn list_all_containers(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    list_kind(session, terms, ListKind::All)
}

/// `list_defined_containers(Path)`.
pub fn list_defined_containers(
    session: &mut Session,
    terms: &[Term],
) -> Result<Reply, CommandError> {
    list_kind(session, terms, ListKind::Defined)
}

/// `argv(List)`: converts a vector and logs it. Needs no container.
pub fn argv(_session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let mut args = Arguments::new(terms);
    let vector: Argv = args.argv()?;
    for (index, element) in vector.iter().enumerate() {
        debug!(
            target: HANDLER_TARGET,
            index,
            element = %element.to_string_lossy(),
            "argv element"
        );
    }
    Ok(Reply::ok())
}

/// `name()`: the container name as a bare binary.
pub fn name(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    Ok(Reply::binary(bound(session)?.name()))
}

/// `defined()`.
pub fn defined(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    Ok(Reply::boolean(bound(session)?.is_defined()))
}

/// `running()`.
pub fn running(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    Ok(Reply::boolean(bound(session)?.is_running()))
}

/// `init_pid()`: always `{ok, Pid}`, negative when nothing runs.
pub fn init_pid(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    let pid = bound(session)?.init_pid();
    Ok(Reply::ok_value(Payload::Integer(i64::from(pid))))
}

/// `config_file_name()`.
pub fn config_file_name(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    Ok(Reply::binary(bound(session)?.config_file_name()))
}

/// `get_config_path()`.
pub fn get_config_path(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    Ok(Reply::binary(bound(session)?.config_path()))
}
