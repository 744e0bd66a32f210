//! Port process bridging a remote caller to liblxc.
//!
//! The port reads command requests from standard input, one JSON line each,
//! and answers every request with exactly one reply line on standard output.
//! Each request names a command by numeric id and carries positional
//! arguments as tagged terms. The dispatcher checks the id and the argument
//! count, the handler converts arguments into native strings and vectors,
//! calls into the container library, and encodes the outcome as one of a
//! small set of reply shapes.
//!
//! ## Reply shapes
//!
//! - bare atoms: `ok`, `true`, `false`, `badarg`;
//! - `{ok, Payload}` where the payload is a binary, an integer, or a list of
//!   binaries;
//! - `{error, Reason}` where the reason is a lowercase errno name, `none`, or
//!   `{unknown, Code}`;
//! - a bare binary for the name and path accessors.
//!
//! ## Starting containers
//!
//! Starting a container blocks for as long as the container runs, so `start`
//! forks. The child runs the container and never returns to the dispatch
//! loop; the parent answers `{ok, Pid}` immediately and keeps one extra
//! reference on the container for the child until `stop` releases it.
//!
//! Diagnostics go to standard error through `tracing`. Standard output is
//! reserved for replies.

mod bootstrap;
mod dispatch;
mod handlers;
mod listing;
pub mod marshal;
pub mod native;
pub mod reply;
mod session;
mod stdio;
mod supervisor;
mod telemetry;
pub mod term;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Port, StaticConfigLoader, SystemConfigLoader, bind_session,
    bootstrap_with,
};
pub use dispatch::{Command, CommandTable, Dispatcher, RegistryError, STANDARD_COMMANDS};
pub use handlers::{CommandError, Handler};
pub use listing::MAX_NAME_BYTES;
pub use session::{Session, Supervised};
pub use stdio::{SilenceError, SilencedStdout};
pub use supervisor::{CHILD_FAILURE_STATUS, ForkSupervisor, Supervisor};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    CommandRequest, Frame, MAX_REQUEST_BYTES, ReplyWriter, RequestReader, TransportError, serve,
};

#[cfg(test)]
mod tests;
