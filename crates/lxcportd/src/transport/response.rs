//! Reply serialization.

use std::io::Write;

use crate::reply::Reply;
use crate::term::Term;

use super::errors::TransportError;

/// Writes replies as JSONL, flushing after each one.
#[derive(Debug)]
pub struct ReplyWriter<W> {
    writer: W,
}

impl<W: Write> ReplyWriter<W> {
    /// Wraps the output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one reply line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing, or flushing fails.
    pub fn write_reply(&mut self, reply: Reply) -> Result<(), TransportError> {
        let term = Term::from(reply);
        serde_json::to_writer(&mut self.writer, &term).map_err(TransportError::Serialize)?;
        self.writer.write_all(b"\n").map_err(TransportError::Write)?;
        self.writer.flush().map_err(TransportError::Write)
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
