//! Storage backend implementations of the [`Folder`](crate::Folder) contract.
//!
//! Backends differ only in how they connect and how native errors translate
//! into the shared taxonomy; the contract semantics are identical.

mod fs;
#[cfg(feature = "mock")]
mod memory;
#[cfg(feature = "sftp")]
mod sftp;

pub use self::fs::FsFolder;
#[cfg(feature = "mock")]
pub use self::memory::MemoryFolder;
#[cfg(feature = "sftp")]
pub use self::sftp::{SftpCredentials, SftpFolder};
