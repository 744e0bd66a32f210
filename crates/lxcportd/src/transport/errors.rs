//! Error types for the request channel.

use std::io;

use thiserror::Error;

/// Errors surfaced while reading requests or writing replies.
///
/// Only I/O failures end the serve loop. Malformed and oversized requests are
/// logged and answered with `badarg`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request line could not be parsed as a command request.
    #[error("malformed request: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
        /// Parser error, when there is one.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// Request line exceeds the size limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Bytes received for the line.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
    /// Reading from the channel failed.
    #[error("failed to read request: {0}")]
    Read(#[source] io::Error),
    /// Writing a reply failed.
    #[error("failed to write reply: {0}")]
    Write(#[source] io::Error),
    /// A reply could not be serialized.
    #[error("failed to serialize reply: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl TransportError {
    /// Creates a malformed request error from a parser error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed request error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a request too large error.
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }
}
