//! Command lookup and shape checking.
//!
//! The dispatcher resolves a wire id against the [`CommandTable`], checks the
//! argument count, and hands the arguments to the handler untouched. Unknown
//! ids answer `{error, einval}` and arity mismatches answer `badarg` without
//! running any handler.

mod registry;

use tracing::{debug, warn};

use crate::reply::Reply;
use crate::session::Session;
use crate::term::Term;

pub use self::registry::{Command, CommandTable, RegistryError, STANDARD_COMMANDS};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Routes requests to command handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: CommandTable,
}

impl Dispatcher {
    /// Creates a dispatcher over `table`.
    #[must_use]
    pub fn new(table: CommandTable) -> Self {
        Self { table }
    }

    /// The table requests are resolved against.
    #[must_use]
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Runs one request and returns its reply.
    pub fn dispatch(&self, session: &mut Session, id: u32, arguments: &[Term]) -> Reply {
        let Some(command) = self.table.get(id) else {
            warn!(target: DISPATCH_TARGET, id, "unknown command");
            return Reply::invalid();
        };

        if arguments.len() != command.arity() {
            warn!(
                target: DISPATCH_TARGET,
                command = command.name(),
                expected = command.arity(),
                received = arguments.len(),
                "wrong number of arguments"
            );
            return Reply::badarg();
        }

        debug!(target: DISPATCH_TARGET, command = command.name(), "dispatching request");

        match (command.handler())(session, arguments) {
            Ok(reply) => reply,
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    command = command.name(),
                    %error,
                    "command rejected"
                );
                error.into()
            }
        }
    }
}
