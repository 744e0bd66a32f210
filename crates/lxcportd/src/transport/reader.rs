//! Bounded request line reader.

use std::io::{self, BufRead};

use super::errors::TransportError;

/// Maximum size of a single request line in bytes, delimiter included.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// One unit read from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, or the unterminated tail before end of input.
    Line(Vec<u8>),
    /// A line that exceeded the limit. Its bytes were discarded.
    Oversized {
        /// Bytes the line occupied.
        size: usize,
    },
}

/// Splits a byte stream into bounded request lines.
///
/// An oversized line is skipped up to its delimiter so the next request is
/// read from a clean boundary.
#[derive(Debug)]
pub struct RequestReader<R> {
    inner: R,
    limit: usize,
}

impl<R: BufRead> RequestReader<R> {
    /// Wraps `inner` with the default limit.
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_REQUEST_BYTES)
    }

    /// Wraps `inner` with a custom limit.
    pub fn with_limit(inner: R, limit: usize) -> Self {
        Self { inner, limit }
    }

    /// Reads the next frame, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Read`] when the underlying reader fails.
    /// Interrupted reads are retried.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        let mut buffer = Vec::new();
        let mut size = 0_usize;
        let mut oversized = false;

        loop {
            let available = match self.inner.fill_buf() {
                Ok(bytes) => bytes,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(TransportError::Read(error)),
            };

            if available.is_empty() {
                return Ok((size > 0).then(|| finish(buffer, size, oversized)));
            }

            let (chunk, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(newline) => (&available[..=newline], true),
                None => (available, false),
            };
            let consumed = chunk.len();
            size += consumed;
            if size > self.limit {
                oversized = true;
                buffer = Vec::new();
            } else if !oversized {
                buffer.extend_from_slice(chunk);
            }
            self.inner.consume(consumed);

            if complete {
                return Ok(Some(finish(buffer, size, oversized)));
            }
        }
    }
}

fn finish(buffer: Vec<u8>, size: usize, oversized: bool) -> Frame {
    if oversized {
        Frame::Oversized { size }
    } else {
        Frame::Line(buffer)
    }
}
