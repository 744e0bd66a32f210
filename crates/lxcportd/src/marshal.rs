//! Conversion of remote terms into native call arguments.
//!
//! Two conversions matter to the native library: a single term into a
//! NUL-terminated string, and a list of terms into a sentinel-terminated
//! argument vector. Both take ownership of everything they allocate, so a
//! conversion that fails part way releases whatever it already built before
//! the error reaches the handler. No native call ever sees a partial vector.

use std::ffi::{CStr, CString, c_char};
use std::ptr;

use thiserror::Error;

use crate::term::Term;

/// Errors raised while converting terms into native arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    /// The term is not a binary or an iolist.
    #[error("expected a binary or iolist, got {kind}")]
    NotIoList {
        /// Tag of the offending term.
        kind: &'static str,
    },
    /// An iolist element was an integer outside the byte range.
    #[error("iolist byte {value} is out of range")]
    ByteOutOfRange {
        /// The offending value.
        value: i64,
    },
    /// The flattened bytes contain an interior NUL.
    #[error("native strings cannot contain NUL (found at offset {offset})")]
    InteriorNul {
        /// Offset of the first NUL byte.
        offset: usize,
    },
    /// A required string argument was empty.
    #[error("required string argument is empty")]
    Empty,
    /// The term is not an integer.
    #[error("expected an integer, got {kind}")]
    NotInteger {
        /// Tag of the offending term.
        kind: &'static str,
    },
    /// The integer does not fit a C `int`.
    #[error("integer {value} does not fit a native int")]
    IntegerOutOfRange {
        /// The offending value.
        value: i64,
    },
    /// The term is not a list.
    #[error("expected a list, got {kind}")]
    NotList {
        /// Tag of the offending term.
        kind: &'static str,
    },
    /// An element of an argument vector failed to convert.
    #[error("argument vector element {index} is invalid: {source}")]
    ArgvElement {
        /// Zero-based position of the failing element.
        index: usize,
        /// Why the element was rejected.
        #[source]
        source: Box<MarshalError>,
    },
    /// The handler asked for more arguments than the request carried.
    #[error("missing argument {position}")]
    Missing {
        /// Zero-based position of the missing argument.
        position: usize,
    },
}

/// Flattens a binary or iolist into contiguous bytes.
///
/// An iolist is a possibly nested list whose leaves are binaries or integers
/// in `0..=255`.
///
/// # Errors
///
/// Returns [`MarshalError::NotIoList`] for atoms, tuples, and bare integers,
/// and [`MarshalError::ByteOutOfRange`] for list integers outside a byte.
pub fn iolist_bytes(term: &Term) -> Result<Vec<u8>, MarshalError> {
    let mut bytes = Vec::new();
    match term {
        Term::Binary(data) => bytes.extend_from_slice(data),
        Term::List(items) => flatten_into(items, &mut bytes)?,
        other => return Err(MarshalError::NotIoList { kind: other.kind() }),
    }
    Ok(bytes)
}

fn flatten_into(items: &[Term], bytes: &mut Vec<u8>) -> Result<(), MarshalError> {
    for item in items {
        match item {
            Term::Integer(value) => {
                let byte =
                    u8::try_from(*value).map_err(|_| MarshalError::ByteOutOfRange { value: *value })?;
                bytes.push(byte);
            }
            Term::Binary(data) => bytes.extend_from_slice(data),
            Term::List(nested) => flatten_into(nested, bytes)?,
            other => return Err(MarshalError::NotIoList { kind: other.kind() }),
        }
    }
    Ok(())
}

fn bytes_to_cstring(bytes: Vec<u8>) -> Result<CString, MarshalError> {
    CString::new(bytes).map_err(|error| MarshalError::InteriorNul {
        offset: error.nul_position(),
    })
}

/// Converts a term into a native string.
///
/// A zero-length binary or iolist yields `None`, which the native library
/// reads as "not supplied". This is distinct from a non-empty value.
///
/// # Errors
///
/// Fails when the term is not an iolist or its bytes contain a NUL.
pub fn to_native_string(term: &Term) -> Result<Option<CString>, MarshalError> {
    let bytes = iolist_bytes(term)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    bytes_to_cstring(bytes).map(Some)
}

/// Owned, NUL-sentinel-terminated argument vector.
///
/// The pointer table always ends with a null entry, so [`Argv::as_ptr`] can be
/// handed to native functions expecting `char *const argv[]`. The strings are
/// owned by the vector and released when it drops.
#[derive(Debug)]
pub struct Argv {
    strings: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl Argv {
    /// Converts a list term into an argument vector.
    ///
    /// Elements are converted left to right. Empty elements become empty
    /// strings rather than terminating the vector early.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::NotList`] when the term is not a list and
    /// [`MarshalError::ArgvElement`] naming the first element that fails. The
    /// elements converted before it are dropped with the partial vector.
    pub fn from_term(term: &Term) -> Result<Self, MarshalError> {
        let Term::List(items) = term else {
            return Err(MarshalError::NotList { kind: term.kind() });
        };

        let mut strings = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let element = iolist_bytes(item)
                .and_then(bytes_to_cstring)
                .map_err(|source| MarshalError::ArgvElement {
                    index,
                    source: Box::new(source),
                })?;
            strings.push(element);
        }
        Ok(Self::from_strings(strings))
    }

    fn from_strings(strings: Vec<CString>) -> Self {
        let mut pointers = Vec::with_capacity(strings.len() + 1);
        pointers.extend(strings.iter().map(|value| value.as_ptr()));
        pointers.push(ptr::null());
        Self { strings, pointers }
    }

    /// Number of arguments, excluding the sentinel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` when the vector holds only the sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterates over the arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.strings.iter().map(CString::as_c_str)
    }

    /// Pointer table including the trailing null sentinel.
    #[must_use]
    pub fn pointers(&self) -> &[*const c_char] {
        &self.pointers
    }

    /// Raw pointer to the sentinel-terminated table.
    ///
    /// The pointer is valid for as long as `self` is borrowed.
    #[must_use]
    pub fn as_ptr(&self) -> *const *const c_char {
        self.pointers.as_ptr()
    }
}

/// Left-to-right cursor over a request's arguments.
///
/// Handlers consume their fixed arguments in order; the first malformed one
/// stops the handler with a [`MarshalError`].
#[derive(Debug)]
pub struct Arguments<'a> {
    terms: &'a [Term],
    position: usize,
}

impl<'a> Arguments<'a> {
    /// Wraps the argument list of one request.
    #[must_use]
    pub const fn new(terms: &'a [Term]) -> Self {
        Self { terms, position: 0 }
    }

    fn next_term(&mut self) -> Result<&'a Term, MarshalError> {
        let position = self.position;
        let term = self
            .terms
            .get(position)
            .ok_or(MarshalError::Missing { position })?;
        self.position += 1;
        Ok(term)
    }

    /// Consumes an argument without interpreting it.
    ///
    /// # Errors
    ///
    /// Fails only when the argument is missing.
    pub fn skip(&mut self) -> Result<&'a Term, MarshalError> {
        self.next_term()
    }

    /// Consumes a string that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Fails when the argument is missing, empty, or not an iolist.
    pub fn required_string(&mut self) -> Result<CString, MarshalError> {
        to_native_string(self.next_term()?)?.ok_or(MarshalError::Empty)
    }

    /// Consumes a string where an empty value means "not supplied".
    ///
    /// # Errors
    ///
    /// Fails when the argument is missing or not an iolist.
    pub fn optional_string(&mut self) -> Result<Option<CString>, MarshalError> {
        to_native_string(self.next_term()?)
    }

    /// Consumes an integer that fits a native `int`.
    ///
    /// # Errors
    ///
    /// Fails when the argument is missing, not an integer, or out of range.
    pub fn integer(&mut self) -> Result<i32, MarshalError> {
        match self.next_term()? {
            Term::Integer(value) => {
                i32::try_from(*value).map_err(|_| MarshalError::IntegerOutOfRange { value: *value })
            }
            other => Err(MarshalError::NotInteger { kind: other.kind() }),
        }
    }

    /// Consumes an argument vector.
    ///
    /// # Errors
    ///
    /// Fails as [`Argv::from_term`] does.
    pub fn argv(&mut self) -> Result<Argv, MarshalError> {
        Argv::from_term(self.next_term()?)
    }

    /// Consumes an argument vector where the empty list means "no vector".
    ///
    /// The native library distinguishes a null vector from a vector holding
    /// only the sentinel, so an empty list maps to `None`.
    ///
    /// # Errors
    ///
    /// Fails as [`Argv::from_term`] does.
    pub fn optional_argv(&mut self) -> Result<Option<Argv>, MarshalError> {
        let term = self.next_term()?;
        if term.is_empty_list() {
            return Ok(None);
        }
        Argv::from_term(term).map(Some)
    }
}
