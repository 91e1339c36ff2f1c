//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories shared by every backend.
///
/// Native backend errors (ssh2, std::io, ...) are translated into these kinds
/// at the single point where the native call is made, so callers never have
/// to branch on backend-specific error types.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The requested object is absent. Often an expected outcome (existence
    /// probes), so never logged as an error by this crate.
    #[display("object not found: {_0}")]
    ObjectNotFound(#[error(not(source))] String),
    /// The backend connector could not establish a session. Cached by the
    /// connector so repeated calls do not re-dial an unreachable host.
    #[display("{_0}")]
    Connection(#[error(not(source))] String),
    /// A native backend call failed for a reason other than absence.
    #[display("{op} failed for '{path}'")]
    Backend { op: &'static str, path: String },
    /// Path contains invalid characters or escapes the folder root.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Underlying I/O error with no more specific category.
    #[display("I/O error: {_0}")]
    Io(IoError),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    pub fn backend(op: &'static str, path: impl Into<String>) -> Self {
        Self::Backend { op, path: path.into() }
    }

    /// Returns `true` if the error means "definitely absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Backend { .. } | Self::Io(_))
    }
}
