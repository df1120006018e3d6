//! Error types for encoding and decoding.
//!
//! Every failure aborts the whole encode or decode call that produced it; there
//! is no per-field recovery. Errors raised while reading carry the byte offset
//! into the input at which the problem was detected.
//!
//! ## Error Categories
//!
//! - **Syntax**: the bytes do not follow the wire grammar (bad descriptor byte,
//!   unterminated string, premature end of input)
//! - **Type mismatch**: the wire value cannot be stored in the destination kind
//! - **Overflow**: a number does not fit the destination's width or signedness
//! - **Unknown field**: an incoming key has no destination field (strict mode only)
//! - **Limits**: nesting too deep, or a length prefix that is unreasonable
//! - **Registration**: an extension was registered twice, or too late
//! - **Custom**: a user hook (extension or self codec) failed
//!
//! ## Examples
//!
//! ```rust
//! use polycodec::{from_slice, Error, ErrorKind, SimpleHandle};
//!
//! let handle = SimpleHandle::new();
//! // 0x09 = positive integer with a 2-byte payload, here 300
//! let result: Result<u8, Error> = from_slice(&handle, &[0x09, 0x01, 0x2c]);
//! assert_eq!(result.unwrap_err().kind(), ErrorKind::Overflow);
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

/// Represents all possible errors that can occur while encoding or decoding.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// I/O error reported by the underlying reader or writer
    #[error("IO error: {0}")]
    Io(String),

    /// The input does not match the grammar of the wire format
    #[error("Syntax error at offset {pos}: {msg}")]
    Syntax { pos: usize, msg: String },

    /// The input ended in the middle of a value
    #[error("Unexpected end of input at offset {pos}: expected {expected}")]
    UnexpectedEof { pos: usize, expected: String },

    /// Wire value kind cannot be coerced into the destination kind
    #[error("Type mismatch at offset {pos}: expected {expected}, found {found}")]
    TypeMismatch {
        pos: usize,
        expected: String,
        found: String,
    },

    /// Numeric value does not fit the destination type
    #[error("Overflow at offset {pos}: value {value} does not fit in {target}")]
    Overflow {
        pos: usize,
        value: String,
        target: &'static str,
    },

    /// Incoming keyed value has no matching destination field
    #[error("Unknown field at offset {pos}: no field named {name:?} in {target}")]
    UnknownField {
        pos: usize,
        name: String,
        target: &'static str,
    },

    /// Container nesting exceeded the configured maximum
    #[error("Maximum nesting depth of {max} exceeded at offset {pos}")]
    DepthLimit { pos: usize, max: usize },

    /// A fixed-size destination cannot hold all incoming elements, or a length is unusable
    #[error("Length error at offset {pos}: {msg}")]
    Length { pos: usize, msg: String },

    /// Extension registration failed
    #[error("Registration error: {0}")]
    Registration(String),

    /// The value or type cannot be represented
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Error returned by a user supplied hook
    #[error("Error: {0}")]
    Custom(String),
}

/// Coarse classification of an [`Error`], matching the documented taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Syntax,
    TypeMismatch,
    Overflow,
    UnknownField,
    Limit,
    Registration,
    Unsupported,
    Custom,
}

impl Error {
    /// Creates a syntax error at the given input offset.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Error;
    ///
    /// let err = Error::syntax(10, "invalid descriptor 0xc1");
    /// assert!(err.to_string().contains("offset 10"));
    /// ```
    pub fn syntax<T: fmt::Display>(pos: usize, msg: T) -> Self {
        Error::Syntax {
            pos,
            msg: msg.to_string(),
        }
    }

    /// Creates an end-of-input error.
    pub fn eof(pos: usize, expected: &str) -> Self {
        Error::UnexpectedEof {
            pos,
            expected: expected.to_string(),
        }
    }

    /// Creates a type mismatch error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Error;
    ///
    /// let err = Error::type_mismatch(5, "integer", "string");
    /// assert!(err.to_string().contains("expected integer"));
    /// ```
    pub fn type_mismatch(pos: usize, expected: &str, found: &str) -> Self {
        Error::TypeMismatch {
            pos,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates an overflow error for a value that does not fit `target`.
    pub fn overflow<T: fmt::Display>(pos: usize, value: T, target: &'static str) -> Self {
        Error::Overflow {
            pos,
            value: value.to_string(),
            target,
        }
    }

    pub fn unknown_field(pos: usize, name: &str, target: &'static str) -> Self {
        Error::UnknownField {
            pos,
            name: name.to_string(),
            target,
        }
    }

    pub fn depth_limit(pos: usize, max: usize) -> Self {
        Error::DepthLimit { pos, max }
    }

    pub fn length<T: fmt::Display>(pos: usize, msg: T) -> Self {
        Error::Length {
            pos,
            msg: msg.to_string(),
        }
    }

    pub fn registration<T: fmt::Display>(msg: T) -> Self {
        Error::Registration(msg.to_string())
    }

    pub fn unsupported<T: fmt::Display>(msg: T) -> Self {
        Error::Unsupported(msg.to_string())
    }

    /// Creates a custom error with a display message.
    ///
    /// Extension and self-codec hooks use this to report their own failures;
    /// the message is surfaced verbatim as the result of the call.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Error;
    ///
    /// let err = Error::custom("cents must be positive");
    /// assert!(err.to_string().contains("cents must be positive"));
    /// ```
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Creates an I/O error.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Returns the category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Syntax { .. } | Error::UnexpectedEof { .. } => ErrorKind::Syntax,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::UnknownField { .. } => ErrorKind::UnknownField,
            Error::DepthLimit { .. } | Error::Length { .. } => ErrorKind::Limit,
            Error::Registration(_) => ErrorKind::Registration,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Custom(_) => ErrorKind::Custom,
        }
    }

    /// Returns the input offset at which the error was detected, if known.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::Syntax { pos, .. }
            | Error::UnexpectedEof { pos, .. }
            | Error::TypeMismatch { pos, .. }
            | Error::Overflow { pos, .. }
            | Error::UnknownField { pos, .. }
            | Error::DepthLimit { pos, .. }
            | Error::Length { pos, .. } => Some(*pos),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::syntax(0, "x").kind(), ErrorKind::Syntax);
        assert_eq!(Error::eof(3, "byte").kind(), ErrorKind::Syntax);
        assert_eq!(Error::overflow(1, 300, "u8").kind(), ErrorKind::Overflow);
        assert_eq!(Error::depth_limit(9, 4).kind(), ErrorKind::Limit);
        assert_eq!(Error::length(9, "too long").kind(), ErrorKind::Limit);
        assert_eq!(
            Error::unknown_field(2, "extra", "Widget").kind(),
            ErrorKind::UnknownField
        );
        assert_eq!(Error::custom("hook").kind(), ErrorKind::Custom);
    }

    #[test]
    fn test_position() {
        assert_eq!(Error::overflow(17, 300, "u8").position(), Some(17));
        assert_eq!(Error::registration("dup").position(), None);
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("pipe closed"));
    }
}
