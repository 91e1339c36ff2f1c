//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration sources could not be read or deserialized.
    #[display("failed to load configuration: {_0}")]
    Load(figment::Error),
    /// The storage prefix is not a parseable URL or lacks a host.
    #[display("invalid storage prefix: {_0}")]
    InvalidPrefix(#[error(not(source))] String),
    /// The storage prefix names a scheme no backend implements.
    #[display("unsupported storage scheme: {_0}")]
    UnsupportedScheme(#[error(not(source))] String),
    /// A setting the selected backend requires was not provided.
    #[display("missing required setting: {_0}")]
    MissingSetting(#[error(not(source))] &'static str),
    /// The backend rejected the configured root.
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
}
