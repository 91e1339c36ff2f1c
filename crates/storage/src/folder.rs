//! The `Folder` contract every storage backend satisfies.
//!
//! A folder is a cheap, value-like handle to a hierarchical namespace rooted
//! at some backend-specific path. Deriving a sub-folder never mutates the
//! parent, and handles are safe to pass between tasks freely: the memoized
//! backend connection is the only shared state behind them.

use crate::cancel::CancelRead;
use crate::error::{ErrorKind, Result};
use crate::object::{FolderDigest, Object};
use async_trait::async_trait;
use std::io::Read;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared folder handle for dynamic dispatch.
pub type FolderHandle = Arc<dyn Folder>;
/// Marker trait for blocking byte streams, so the boxed form can be named
/// in a local `Debug` impl. Blanket-implemented for every `Read + Send`.
pub trait SyncRead: Read + Send {}
impl<T: Read + Send + ?Sized> SyncRead for T {}

impl std::fmt::Debug for dyn SyncRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SyncRead")
    }
}

/// Blocking byte stream, suitable for use inside `spawn_blocking`.
pub type BoxSyncRead = Box<dyn SyncRead + 'static>;

/// Immediate children of a folder: stored objects and sub-folder handles.
#[derive(Debug, Default)]
pub struct Listing {
    pub objects: Vec<Object>,
    pub subfolders: Vec<FolderHandle>,
}

/// Uniform interface over storage backends.
///
/// Semantics are identical regardless of backend; each implementation
/// translates its native errors into the shared
/// [`ErrorKind`](crate::ErrorKind) taxonomy at the point of the native call.
///
/// Every method that touches the network blocks the calling task until the
/// backend responds; callers needing parallelism run operations on separate
/// tasks. No ordering is guaranteed across concurrent operations, and
/// concurrent writers to the *same* name are undefined at this layer —
/// callers enforce unique names (e.g. timestamp-derived backup names).
///
/// # Examples
///
/// ```no_run
/// use walvault_storage::{Folder, Result};
///
/// async fn newest_object(folder: &dyn Folder) -> Result<Option<String>> {
///     let listing = folder.list().await?;
///     Ok(listing
///         .objects
///         .into_iter()
///         .max_by_key(|object| object.last_modified)
///         .map(|object| object.name))
/// }
/// ```
#[async_trait]
pub trait Folder: Send + Sync {
    /// Root path of this folder, with a trailing `/` (empty for the root).
    fn path(&self) -> &str;

    /// Derives a handle for a sub-folder. Pure, no I/O, always succeeds.
    fn subfolder(&self, relative_path: &str) -> FolderHandle;

    /// Identity digest of backend kind + host + path + user. Pure, no I/O.
    fn digest(&self) -> FolderDigest;

    /// Lists immediate children only (never recursive).
    ///
    /// A missing folder is not an error: "no objects yet" is a normal state,
    /// so it yields an empty [`Listing`]. Any other enumeration failure
    /// surfaces as [`ErrorKind::Backend`] wrapping the native cause.
    async fn list(&self) -> Result<Listing>;

    /// Checks whether an object exists.
    ///
    /// Distinguishes "definitely absent" (`Ok(false)`) from "could not
    /// determine" (`Err(_)`).
    async fn exists(&self, relative_path: &str) -> Result<bool>;

    /// Opens an object for reading.
    ///
    /// Fails with [`ErrorKind::ObjectNotFound`] if absent. The returned
    /// stream is buffered (backends with per-request latency use a large
    /// block size) and releases backend resources on drop.
    async fn read_object(&self, relative_path: &str) -> Result<BoxSyncRead>;

    /// Writes an object, creating missing intermediate directories.
    ///
    /// Overwrites an existing object of the same name; backends that can do
    /// so atomically must (no partially-written object visible under the
    /// final name), and backends that cannot document the weaker guarantee.
    /// When the write fails, already-opened backend resources are released
    /// best-effort: a cleanup failure is logged, not escalated, because the
    /// original write error is the one that matters to the caller.
    async fn put_object(&self, name: &str, content: BoxSyncRead) -> Result<()>;

    /// [`put_object`](Self::put_object) with a cancellation token wrapped
    /// around the source stream. Cancellation aborts the read side, which
    /// fails the write; the partial destination object is backend-dependent.
    async fn put_object_cancellable(
        &self,
        name: &str,
        content: BoxSyncRead,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.put_object(name, Box::new(CancelRead::new(cancel, content))).await
    }

    /// Copies an object within this folder family.
    ///
    /// Fails with [`ErrorKind::ObjectNotFound`] if `src` is absent;
    /// otherwise equivalent to read-then-write. Backends may substitute a
    /// native server-side copy as long as callers cannot tell.
    async fn copy_object(&self, src: &str, dst: &str) -> Result<()> {
        if !self.exists(src).await? {
            exn::bail!(ErrorKind::ObjectNotFound(crate::path::join(self.path(), src)));
        }
        let content = self.read_object(src).await?;
        self.put_object(dst, content).await
    }

    /// Moves an object: copy followed by delete of `src`.
    ///
    /// Not atomic: if the delete fails after a successful copy, the error is
    /// surfaced but the destination object exists. No automatic rollback.
    async fn move_object(&self, src: &str, dst: &str) -> Result<()> {
        self.copy_object(src, dst).await?;
        self.delete_objects(&[src]).await
    }

    /// Deletes objects, idempotently.
    ///
    /// Already-absent paths are not an error (retried delete batches are
    /// common). A path naming a directory entry is a silent no-op; recursive
    /// directory removal is out of contract.
    async fn delete_objects(&self, relative_paths: &[&str]) -> Result<()>;
}

impl std::fmt::Debug for dyn Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Folder").field("path", &self.path()).finish()
    }
}
