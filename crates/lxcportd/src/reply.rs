//! Canonical reply shapes and the native error taxonomy.
//!
//! Every command answers with exactly one [`Reply`]. The encoder keeps the
//! shapes the caller pattern-matches on stable: bare atoms for status and
//! booleans, `{ok, Payload}` for values, `{error, Reason}` for failures, and a
//! bare binary for the name and path accessors. The reason is the lowercase
//! POSIX name of the native error code, or `{unknown, Code}` when the code has
//! no name.

use std::io;

use nix::errno::Errno;

use crate::term::Term;

/// Raw native error code, sampled from `errno` right after a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrnoCode(i32);

impl ErrnoCode {
    /// Wraps a raw error number.
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Reads the calling thread's current `errno`.
    #[must_use]
    pub fn last() -> Self {
        Self(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }

    /// Resets `errno` to zero ahead of a native call.
    pub fn clear() {
        Errno::clear();
    }

    /// The raw error number.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl From<Errno> for ErrnoCode {
    fn from(errno: Errno) -> Self {
        Self(errno as i32)
    }
}

impl From<io::Error> for ErrnoCode {
    fn from(error: io::Error) -> Self {
        Self(error.raw_os_error().unwrap_or(0))
    }
}

/// Status atoms that travel without a wrapper tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The command succeeded and has nothing to return.
    Ok,
    /// Boolean true.
    True,
    /// Boolean false.
    False,
    /// The request was malformed.
    Badarg,
}

impl Status {
    /// Atom name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::True => "true",
            Self::False => "false",
            Self::Badarg => "badarg",
        }
    }
}

/// Value carried by `{ok, Payload}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A byte string.
    Binary(Vec<u8>),
    /// An integer.
    Integer(i64),
    /// A list of byte strings.
    Binaries(Vec<Vec<u8>>),
}

/// Why a command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// A named native error code.
    Errno(Errno),
    /// A native error code with no symbolic name; the number is preserved.
    Unknown(i32),
    /// The requested value does not exist.
    None,
}

impl Reason {
    /// Maps a native error code to its symbolic reason.
    #[must_use]
    pub fn from_code(code: ErrnoCode) -> Self {
        match Errno::from_raw(code.code()) {
            Errno::UnknownErrno => Self::Unknown(code.code()),
            errno => Self::Errno(errno),
        }
    }

    fn into_term(self) -> Term {
        match self {
            Self::Errno(errno) => Term::atom(errno_name(errno)),
            Self::Unknown(code) => Term::pair(Term::atom("unknown"), Term::Integer(i64::from(code))),
            Self::None => Term::atom("none"),
        }
    }
}

/// Lowercase POSIX name of an error number, e.g. `enoent`.
#[must_use]
pub fn errno_name(errno: Errno) -> String {
    format!("{errno:?}").to_ascii_lowercase()
}

/// One reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A bare atom.
    Status(Status),
    /// `{ok, Payload}`.
    Ok(Payload),
    /// `{error, Reason}`.
    Error(Reason),
    /// A bare binary. Name and path accessors answer this way.
    Binary(Vec<u8>),
}

impl Reply {
    /// The bare `ok` atom.
    #[must_use]
    pub const fn ok() -> Self {
        Self::Status(Status::Ok)
    }

    /// `{ok, Payload}`.
    #[must_use]
    pub const fn ok_value(payload: Payload) -> Self {
        Self::Ok(payload)
    }

    /// `true` or `false`.
    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::Status(if value { Status::True } else { Status::False })
    }

    /// `{error, Reason}` for a native error code.
    #[must_use]
    pub fn errno(code: ErrnoCode) -> Self {
        Self::Error(Reason::from_code(code))
    }

    /// `{error, einval}`, used for unknown commands and missing handles.
    #[must_use]
    pub const fn invalid() -> Self {
        Self::Error(Reason::Errno(Errno::EINVAL))
    }

    /// The bare `badarg` atom.
    #[must_use]
    pub const fn badarg() -> Self {
        Self::Status(Status::Badarg)
    }

    /// `{error, none}`.
    #[must_use]
    pub const fn none() -> Self {
        Self::Error(Reason::None)
    }

    /// A bare binary; an absent value is the empty binary.
    #[must_use]
    pub fn binary(bytes: Option<Vec<u8>>) -> Self {
        Self::Binary(bytes.unwrap_or_default())
    }
}

impl From<Reply> for Term {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Status(status) => Term::atom(status.as_str()),
            Reply::Ok(payload) => Term::pair(Term::atom("ok"), payload.into()),
            Reply::Error(reason) => Term::pair(Term::atom("error"), reason.into_term()),
            Reply::Binary(bytes) => Term::Binary(bytes),
        }
    }
}

impl From<Payload> for Term {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Binary(bytes) => Term::Binary(bytes),
            Payload::Integer(value) => Term::Integer(value),
            Payload::Binaries(items) => Term::List(items.into_iter().map(Term::Binary).collect()),
        }
    }
}
