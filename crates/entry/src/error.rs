//! Entry Decoding Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A decoding error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The entry could not be opened, seeked or read.
    #[display("I/O error")]
    Io,
    /// A size declared inside the entry points past the bytes actually present.
    #[display("truncated {region}: need {needed} bytes, only {available} available")]
    Format {
        /// The part of the entry that does not fit.
        region: &'static str,
        /// Bytes the declared layout requires.
        needed: u64,
        /// Bytes actually present.
        available: u64,
    },
    /// A stored string is not valid UTF-8.
    #[display("invalid UTF-8 in {_0}")]
    Encoding(#[error(not(source))] &'static str),
    /// A field was read but cannot be represented.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A malformed entry stays malformed; only the filesystem can change under us.
        matches!(self, ErrorKind::Io)
    }

    pub(crate) fn truncated(region: &'static str, needed: u64, available: u64) -> Self {
        ErrorKind::Format { region, needed, available }
    }
}
