//! Request deserialization.

use serde::Deserialize;

use crate::term::Term;

use super::errors::TransportError;

/// One command request.
///
/// ```json
/// {"command":14,"arguments":[{"binary":"lxc.net"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRequest {
    /// Wire id of the command.
    pub command: u32,
    /// Positional arguments.
    #[serde(default)]
    pub arguments: Vec<Term>,
}

impl CommandRequest {
    /// Parses a request line. Trailing whitespace, including the newline
    /// delimiter, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Malformed`] when the line is empty or does
    /// not match the request schema.
    pub fn parse(line: &[u8]) -> Result<Self, TransportError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(TransportError::malformed("empty request line"));
        }
        serde_json::from_slice(trimmed).map_err(TransportError::from_json_error)
    }
}

fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
