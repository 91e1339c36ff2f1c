pub mod backend;
mod cancel;
pub mod error;
mod folder;
mod object;
pub mod path;

pub use crate::cancel::CancelRead;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::folder::{BoxSyncRead, Folder, FolderHandle, Listing};
pub use crate::object::{FolderDigest, Object, digest_parts};
