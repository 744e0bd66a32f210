//! Container enumeration.

use std::ffi::CStr;

use tracing::debug;

use crate::native::{ContainerLibrary, ListKind};
use crate::reply::{Payload, Reply};

const LISTING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::listing");

/// Upper bound on a listed name, matching the host name limit.
pub const MAX_NAME_BYTES: usize = 64;

/// Lists the containers of `kind` under `path`, or the default root.
///
/// A negative native count becomes `{error, Reason}`; anything else, including
/// an empty root, is `{ok, [Name]}`.
pub fn list(library: &dyn ContainerLibrary, kind: ListKind, path: Option<&CStr>) -> Reply {
    match library.list(kind, path) {
        Ok(names) => {
            debug!(
                target: LISTING_TARGET,
                kind = kind.as_str(),
                count = names.len(),
                "listed containers"
            );
            let names = names.into_iter().map(bounded).collect();
            Reply::ok_value(Payload::Binaries(names))
        }
        Err(code) => {
            debug!(
                target: LISTING_TARGET,
                kind = kind.as_str(),
                code = code.code(),
                "listing failed"
            );
            Reply::errno(code)
        }
    }
}

fn bounded(mut name: Vec<u8>) -> Vec<u8> {
    name.truncate(MAX_NAME_BYTES);
    name
}
