//! Error types for the codecs.

use crate::registry::PayloadKind;
use thiserror::Error;

/// A payload could not be encoded or decoded.
///
/// Decode failures mean the bytes are damaged or were produced by a replica
/// with a different schema; none of them is recoverable for that message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Truncated payload: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Length prefix {declared} exceeds the {remaining} remaining bytes")]
    LengthOverrun { declared: usize, remaining: usize },

    #[error("Unknown field id: {0}")]
    UnknownField(u16),

    #[error("Invalid UTF-8 in string value: {0}")]
    InvalidUtf8(String),

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    #[error("Value too large for wire format: {0} bytes")]
    ValueTooLarge(usize),

    #[error("Unknown type id: {0}")]
    UnknownTypeId(u16),

    #[error("Type id {0} is already registered")]
    DuplicateTypeId(u16),

    #[error("No type id registered for {0:?} payloads")]
    UnregisteredKind(PayloadKind),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::string::FromUtf8Error> for FormatError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        FormatError::InvalidUtf8(err.to_string())
    }
}

impl From<std::io::Error> for FormatError {
    fn from(err: std::io::Error) -> Self {
        FormatError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FormatError>;
