//! Per-command handlers.
//!
//! Every handler follows the same template: require a bound container where
//! the command needs one, consume the arguments left to right, make one native
//! call, and encode the result. Failures before the native call surface as
//! [`CommandError`] and are turned into replies by the dispatcher, so each
//! request yields exactly one reply whichever branch it takes.

mod config;
mod lifecycle;
mod query;

use thiserror::Error;

use crate::marshal::MarshalError;
use crate::native::Container;
use crate::reply::Reply;
use crate::session::Session;
use crate::term::Term;

pub use config::{
    clear_config, clear_config_item, get_config_item, get_keys, load_config, set_config_item,
    set_config_path,
};
pub use lifecycle::{create, destroy, shutdown, start, stop};
pub use query::{
    argv, config_file_name, defined, get_config_path, init_pid, list_active_containers,
    list_all_containers, list_defined_containers, name, running,
};

pub(crate) const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handlers");

/// Signature shared by every command handler.
pub type Handler = fn(&mut Session, &[Term]) -> Result<Reply, CommandError>;

/// Failures that end a handler before its native call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command needs a container and none is bound.
    #[error("no container is bound to this session")]
    NoHandle,
    /// An argument could not be converted.
    #[error("bad argument: {0}")]
    BadArgument(#[from] MarshalError),
    /// An integer argument is outside the range the command accepts.
    #[error("{name} must not be {value}")]
    OutOfRange {
        /// Argument name.
        name: &'static str,
        /// Rejected value.
        value: i64,
    },
    /// A native size probe reported a length the command cannot buffer.
    #[error("{operation} reported {length} bytes, limit is {limit}")]
    Oversized {
        /// Operation that reported the length.
        operation: &'static str,
        /// Reported length.
        length: i64,
        /// Largest accepted length, exclusive.
        limit: usize,
    },
    /// The library refused an extra reference on the container.
    #[error("container reference could not be acquired")]
    ReferenceRefused,
}

impl CommandError {
    /// Creates an out-of-range error.
    pub fn out_of_range(name: &'static str, value: impl Into<i64>) -> Self {
        Self::OutOfRange {
            name,
            value: value.into(),
        }
    }

    /// Creates an oversized error.
    pub fn oversized(operation: &'static str, length: impl Into<i64>, limit: usize) -> Self {
        Self::Oversized {
            operation,
            length: length.into(),
            limit,
        }
    }
}

impl From<CommandError> for Reply {
    fn from(error: CommandError) -> Self {
        match error {
            CommandError::NoHandle => Self::invalid(),
            CommandError::BadArgument(_)
            | CommandError::OutOfRange { .. }
            | CommandError::Oversized { .. }
            | CommandError::ReferenceRefused => Self::badarg(),
        }
    }
}

/// The bound container, or [`CommandError::NoHandle`].
fn bound(session: &Session) -> Result<&dyn Container, CommandError> {
    session
        .handle()
        .map(|handle| handle.container())
        .ok_or(CommandError::NoHandle)
}
