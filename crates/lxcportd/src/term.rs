//! Tagged values exchanged with the remote caller.
//!
//! A [`Term`] is the dynamically typed datum carried by the channel. Inbound
//! arguments use integers, binaries, lists, and atoms; replies additionally use
//! tuples. On the wire each term is a single-key JSON object naming its tag:
//!
//! ```json
//! {"list":[{"binary":"lxc.utsname"},{"integer":0},{"atom":"ok"}]}
//! ```
//!
//! Binaries serialise as text when they hold valid UTF-8 and as a byte array
//! otherwise. Both forms are accepted on input.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically tagged value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// Signed integer.
    Integer(i64),
    /// Byte string.
    Binary(#[serde(with = "bytes")] Vec<u8>),
    /// Ordered list of terms.
    List(Vec<Term>),
    /// Symbolic constant.
    Atom(String),
    /// Fixed-size group of terms.
    Tuple(Vec<Term>),
}

impl Term {
    /// Creates an atom.
    pub fn atom(name: impl Into<String>) -> Self {
        Self::Atom(name.into())
    }

    /// Creates a binary from anything byte-like.
    pub fn binary(bytes: impl AsRef<[u8]>) -> Self {
        Self::Binary(bytes.as_ref().to_vec())
    }

    /// Creates a two-element tuple.
    pub fn pair(first: Self, second: Self) -> Self {
        Self::Tuple(vec![first, second])
    }

    /// Returns `true` for the empty list.
    #[must_use]
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Self::List(items) if items.is_empty())
    }

    /// Short tag name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Binary(_) => "binary",
            Self::List(_) => "list",
            Self::Atom(_) => "atom",
            Self::Tuple(_) => "tuple",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Binary(bytes) => write!(f, "<<{:?}>>", String::from_utf8_lossy(bytes)),
            Self::Atom(name) => f.write_str(name),
            Self::List(items) => write_sequence(f, "[", items, "]"),
            Self::Tuple(items) => write_sequence(f, "{", items, "}"),
        }
    }
}

fn write_sequence(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[Term],
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Text(String),
        Raw(Vec<u8>),
    }

    pub(super) fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(value) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.collect_seq(value),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        Ok(match Encoded::deserialize(deserializer)? {
            Encoded::Text(text) => text.into_bytes(),
            Encoded::Raw(bytes) => bytes,
        })
    }
}
