//! JSONL request channel.
//!
//! Requests arrive one per line and every line is answered with exactly one
//! reply line, in order:
//!
//! ```json
//! {"command":6,"arguments":[]}
//! ```
//!
//! ```json
//! {"atom":"true"}
//! ```
//!
//! Lines that are not valid requests, or that exceed [`MAX_REQUEST_BYTES`],
//! are answered with `badarg` and the loop carries on. End of input ends the
//! loop normally.

mod errors;
mod reader;
mod request;
mod response;

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::reply::Reply;
use crate::session::Session;

pub use self::errors::TransportError;
pub use self::reader::{Frame, MAX_REQUEST_BYTES, RequestReader};
pub use self::request::CommandRequest;
pub use self::response::ReplyWriter;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Serves requests from `input` until end of input.
///
/// Returns the number of requests answered.
///
/// # Errors
///
/// Returns [`TransportError::Read`] or [`TransportError::Write`] when the
/// channel fails, and [`TransportError::Serialize`] if a reply cannot be
/// encoded.
pub fn serve<R, W>(
    input: R,
    output: W,
    dispatcher: &Dispatcher,
    session: &mut Session,
) -> Result<usize, TransportError>
where
    R: BufRead,
    W: Write,
{
    let mut requests = RequestReader::new(input);
    let mut replies = ReplyWriter::new(output);
    let mut served = 0_usize;

    while let Some(frame) = requests.next_frame()? {
        let reply = match frame {
            Frame::Line(line) => match CommandRequest::parse(&line) {
                Ok(request) => dispatcher.dispatch(session, request.command, &request.arguments),
                Err(error) => {
                    warn!(target: TRANSPORT_TARGET, %error, "malformed request");
                    Reply::badarg()
                }
            },
            Frame::Oversized { size } => {
                let error = TransportError::request_too_large(size, MAX_REQUEST_BYTES);
                warn!(target: TRANSPORT_TARGET, %error, "oversized request");
                Reply::badarg()
            }
        };
        replies.write_reply(reply)?;
        served += 1;
    }

    debug!(target: TRANSPORT_TARGET, served, "channel closed");
    Ok(served)
}
