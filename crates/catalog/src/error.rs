//! Catalog Error Types
//!
//! Selection failures are split into "nothing matched" outcomes, which the
//! caller usually reports to the operator, and storage failures, which wrap
//! the underlying [`walvault_storage`] error tree.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog contains no completed backups at all.
    #[display("no backups found")]
    NoBackupsFound,
    /// A backup was requested by exact name and its sentinel is absent.
    #[display("backup '{_0}' does not exist")]
    BackupNotFound(#[error(not(source))] String),
    /// The user-supplied selection pattern is not a valid regex.
    #[display("invalid backup pattern: {_0}")]
    InvalidPattern(#[error(not(source))] String),
    /// A storage operation failed while scanning the catalog.
    #[display("{_0}")]
    Storage(#[error(not(source))] String),
}

impl ErrorKind {
    /// Wraps a storage error, keeping its tree as the cause chain.
    #[track_caller]
    pub fn storage(err: walvault_storage::Error) -> Error {
        let message = err.to_string();
        err.raise(ErrorKind::Storage(message))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::NoBackupsFound.to_string(), "no backups found");
        assert_eq!(
            ErrorKind::BackupNotFound("base_000000010000000000000002".to_string()).to_string(),
            "backup 'base_000000010000000000000002' does not exist"
        );
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::NoBackupsFound.is_retryable());
        assert!(!ErrorKind::InvalidPattern("[".to_string()).is_retryable());
        assert!(ErrorKind::Storage("read directory failed".to_string()).is_retryable());
    }
}
