//! Configuration commands.

use crate::marshal::Arguments;
use crate::reply::{Payload, Reply};
use crate::session::Session;
use crate::term::Term;

use super::{CommandError, bound};

/// Fixed buffer used for key listings.
pub const KEYS_BUFFER_BYTES: usize = 2048;

/// `load_config(Path)`: an empty path loads the default location.
pub fn load_config(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let path = args.optional_string()?;
    Ok(match container.load_config(path.as_deref()) {
        Ok(()) => Reply::ok(),
        Err(code) => Reply::errno(code),
    })
}

/// `get_keys(Prefix)`.
///
/// Without a prefix the library is asked for the listing's length first and
/// listings that would not fit the fixed buffer are refused. With a prefix the
/// fixed buffer is used directly and the listing is cut to fit.
pub fn get_keys(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let prefix = args.optional_string()?;

    let capacity = match prefix {
        Some(_) => KEYS_BUFFER_BYTES,
        None => {
            let needed = container.get_keys(None, None);
            let length = usize::try_from(needed)
                .ok()
                .filter(|length| *length < KEYS_BUFFER_BYTES)
                .ok_or_else(|| CommandError::oversized("get_keys", needed, KEYS_BUFFER_BYTES))?;
            length + 1
        }
    };

    let mut buffer = vec![0_u8; capacity];
    let written = container.get_keys(prefix.as_deref(), Some(&mut buffer));
    Ok(match usize::try_from(written) {
        Ok(length) if length > 0 => {
            buffer.truncate(length.min(capacity - 1));
            Reply::ok_value(Payload::Binary(buffer))
        }
        _ => Reply::none(),
    })
}

/// `clear_config()`.
pub fn clear_config(session: &mut Session, _terms: &[Term]) -> Result<Reply, CommandError> {
    bound(session)?.clear_config();
    Ok(Reply::ok())
}

/// `clear_config_item(Key)`.
pub fn clear_config_item(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let key = args.required_string()?;
    Ok(match container.clear_config_item(&key) {
        Ok(()) => Reply::ok(),
        Err(code) => Reply::errno(code),
    })
}

/// `get_config_item(Key)`: sized with a probe, then read in full.
pub fn get_config_item(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let key = args.required_string()?;

    let needed = container.get_config_item(&key, None);
    let Some(length) = usize::try_from(needed).ok().filter(|length| *length > 0) else {
        return Ok(Reply::none());
    };

    let mut buffer = vec![0_u8; length + 1];
    container.get_config_item(&key, Some(&mut buffer));
    buffer.truncate(length);
    Ok(Reply::ok_value(Payload::Binary(buffer)))
}

/// `set_config_item(Key, Value)`: an empty value is passed as null.
pub fn set_config_item(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let key = args.required_string()?;
    let value = args.optional_string()?;
    Ok(match container.set_config_item(&key, value.as_deref()) {
        Ok(()) => Reply::ok(),
        Err(code) => Reply::errno(code),
    })
}

/// `set_config_path(Path)`.
///
/// The library gives no reason when this fails, so failure is `badarg`
/// rather than `{error, Reason}`.
pub fn set_config_path(session: &mut Session, terms: &[Term]) -> Result<Reply, CommandError> {
    let container = bound(session)?;
    let mut args = Arguments::new(terms);
    let path = args.required_string()?;
    Ok(if container.set_config_path(&path) {
        Reply::ok()
    } else {
        Reply::badarg()
    })
}
