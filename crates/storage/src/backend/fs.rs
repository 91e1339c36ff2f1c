//! Local filesystem storage backend.
//!
//! Backs a folder family with a directory tree on the local machine. Mostly
//! used for file-server mounts and for exercising the contract in tests
//! without a network.

use crate::error::{ErrorKind, Result};
use crate::folder::{BoxSyncRead, Folder, FolderHandle, Listing};
use crate::object::{FolderDigest, Object, digest_parts};
use crate::path;
use async_trait::async_trait;
use exn::ResultExt;
use std::io::{BufReader, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs;
use tokio::task;

/// Folder rooted in a local directory.
pub struct FsFolder {
    /// Absolute directory backing this folder.
    root: PathBuf,
    /// Storage path relative to the configured root, with a trailing `/`.
    path: String,
}

impl FsFolder {
    /// Builds the root folder handle over a local directory.
    ///
    /// The directory must be an absolute path; it is created if missing.
    pub fn configure(root: impl AsRef<Path>) -> Result<FolderHandle> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
            }
        } else {
            // Non-async on purpose: happens once during configuration.
            std::fs::create_dir_all(&root)
                .or_raise(|| ErrorKind::backend("create root directory", root.display().to_string()))?;
        }
        Ok(Arc::new(Self { root, path: String::new() }))
    }

    fn absolute(&self, relative_path: &str) -> Result<PathBuf> {
        Ok(self.root.join(path::validate(relative_path)?))
    }
}

#[async_trait]
impl Folder for FsFolder {
    fn path(&self) -> &str {
        &self.path
    }

    fn subfolder(&self, relative_path: &str) -> FolderHandle {
        Arc::new(Self {
            root: self.root.join(relative_path.trim_matches('/')),
            path: path::ensure_trailing_slash(&path::join(&self.path, relative_path)),
        })
    }

    fn digest(&self) -> FolderDigest {
        digest_parts(&["fs", &self.root.to_string_lossy(), &self.path, ""])
    }

    async fn list(&self) -> Result<Listing> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // A folder nobody has written to yet is a normal state.
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Listing::default()),
            Err(err) => {
                return Err(err).or_raise(|| ErrorKind::backend("read directory", self.root.display().to_string()));
            }
        };

        let mut listing = Listing::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .or_raise(|| ErrorKind::backend("read directory", self.root.display().to_string()))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .or_raise(|| ErrorKind::backend("stat entry", entry.path().display().to_string()))?;
            if metadata.is_dir() {
                listing.subfolders.push(self.subfolder(&name));
            } else if metadata.is_file() {
                let modified = metadata
                    .modified()
                    .or_raise(|| ErrorKind::backend("stat entry", entry.path().display().to_string()))?;
                listing.objects.push(Object::new(name, OffsetDateTime::from(modified), metadata.len()));
            }
            // Anything else is most likely a broken symlink; drop it.
        }
        Ok(listing)
    }

    async fn exists(&self, relative_path: &str) -> Result<bool> {
        let absolute = self.absolute(relative_path)?;
        fs::try_exists(&absolute)
            .await
            .or_raise(|| ErrorKind::backend("check object existence", absolute.display().to_string()))
    }

    async fn read_object(&self, relative_path: &str) -> Result<BoxSyncRead> {
        let absolute = self.absolute(relative_path)?;
        task::spawn_blocking(move || match std::fs::File::open(&absolute) {
            Ok(file) => Ok(Box::new(BufReader::new(file)) as BoxSyncRead),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                exn::bail!(ErrorKind::ObjectNotFound(absolute.display().to_string()))
            }
            Err(err) => Err(err).or_raise(|| ErrorKind::backend("open object", absolute.display().to_string())),
        })
        .await
        .or_raise(|| ErrorKind::backend("open object", path::join(&self.path, relative_path)))?
    }

    async fn put_object(&self, name: &str, content: BoxSyncRead) -> Result<()> {
        let absolute = self.absolute(name)?;
        let mut content = content;
        task::spawn_blocking(move || {
            if let Some(parent) = absolute.parent() {
                std::fs::create_dir_all(parent)
                    .or_raise(|| ErrorKind::backend("create directory", parent.display().to_string()))?;
            }
            // Write to a temporary sibling, then rename over the final name so
            // no partially-written object is ever visible under it. Concurrent
            // writers to the same name remain undefined at this layer.
            let file_name = absolute.file_name().and_then(|name| name.to_str()).unwrap_or("object");
            let scratch = absolute.with_file_name(format!("{file_name}.part"));
            let mut file = std::fs::File::create(&scratch)
                .or_raise(|| ErrorKind::backend("create file", scratch.display().to_string()))?;
            if let Err(err) = std::io::copy(&mut content, &mut file) {
                drop(file);
                if let Err(cleanup_err) = std::fs::remove_file(&scratch) {
                    tracing::warn!(path = %scratch.display(), error = %cleanup_err, "failed to remove scratch file after failed write");
                }
                return Err(err).or_raise(|| ErrorKind::backend("write object", absolute.display().to_string()));
            }
            drop(file);
            std::fs::rename(&scratch, &absolute)
                .or_raise(|| ErrorKind::backend("rename scratch file", absolute.display().to_string()))
        })
        .await
        .or_raise(|| ErrorKind::backend("write object", path::join(&self.path, name)))?
    }

    async fn delete_objects(&self, relative_paths: &[&str]) -> Result<()> {
        let mut absolutes = Vec::with_capacity(relative_paths.len());
        for relative in relative_paths {
            absolutes.push(self.absolute(relative)?);
        }
        task::spawn_blocking(move || {
            for absolute in absolutes {
                let metadata = match std::fs::metadata(&absolute) {
                    Ok(metadata) => metadata,
                    // Deleting an absent object is not an error.
                    Err(err) if err.kind() == IoErrorKind::NotFound => continue,
                    Err(err) => {
                        return Err(err).or_raise(|| ErrorKind::backend("stat object", absolute.display().to_string()));
                    }
                };
                // Directories may be non-empty; skip them.
                if metadata.is_dir() {
                    continue;
                }
                match std::fs::remove_file(&absolute) {
                    Ok(()) => {}
                    Err(err) if err.kind() == IoErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err)
                            .or_raise(|| ErrorKind::backend("delete object", absolute.display().to_string()));
                    }
                }
            }
            Ok(())
        })
        .await
        .or_raise(|| ErrorKind::backend("delete objects", self.path.clone()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn folder_in(dir: &tempfile::TempDir) -> FolderHandle {
        FsFolder::configure(dir.path()).unwrap()
    }

    fn content(bytes: &[u8]) -> BoxSyncRead {
        Box::new(Cursor::new(bytes.to_vec()))
    }

    async fn read_all(folder: &FolderHandle, path: &str) -> Vec<u8> {
        let mut reader = folder.read_object(path).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_configure_requires_absolute_path() {
        assert!(FsFolder::configure("relative/path").is_err());
    }

    #[tokio::test]
    async fn test_put_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("wal_001", content(b"segment bytes")).await.unwrap();
        assert_eq!(read_all(&folder, "wal_001").await, b"segment bytes");
    }

    #[tokio::test]
    async fn test_put_creates_intermediate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("a/b/c/wal_001", content(b"data")).await.unwrap();
        assert!(folder.exists("a/b/c/wal_001").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("obj", content(b"old")).await.unwrap();
        folder.put_object("obj", content(b"new contents")).await.unwrap();
        assert_eq!(read_all(&folder, "obj").await, b"new contents");
    }

    #[tokio::test]
    async fn test_read_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        let err = folder.read_object("missing").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ObjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        assert!(!folder.exists("obj").await.unwrap());
        folder.put_object("obj", content(b"data")).await.unwrap();
        assert!(folder.exists("obj").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_immediate_children_only() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("top.json", content(b"1")).await.unwrap();
        folder.put_object("nested/inner.json", content(b"2")).await.unwrap();
        let listing = folder.list().await.unwrap();
        let names: Vec<_> = listing.objects.iter().map(|object| object.name.as_str()).collect();
        assert_eq!(names, vec!["top.json"]);
        assert_eq!(listing.subfolders.len(), 1);
        assert_eq!(listing.subfolders[0].path(), "nested/");
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        let listing = folder.subfolder("never_written").list().await.unwrap();
        assert!(listing.objects.is_empty());
        assert!(listing.subfolders.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("obj", content(b"data")).await.unwrap();
        folder.delete_objects(&["obj", "never-existed"]).await.unwrap();
        assert!(!folder.exists("obj").await.unwrap());
        // A second batch over the same paths still succeeds.
        folder.delete_objects(&["obj"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("sub/inner", content(b"data")).await.unwrap();
        folder.delete_objects(&["sub"]).await.unwrap();
        assert!(folder.exists("sub/inner").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_object_byte_identity() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        folder.put_object("src", content(&payload)).await.unwrap();
        folder.copy_object("src", "copies/dst").await.unwrap();
        assert_eq!(read_all(&folder, "copies/dst").await, payload);
        assert!(folder.exists("src").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_zero_byte_object() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("empty", content(b"")).await.unwrap();
        folder.copy_object("empty", "empty-copy").await.unwrap();
        assert_eq!(read_all(&folder, "empty-copy").await, b"");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        let err = folder.copy_object("missing", "dst").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ObjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_move_object() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        folder.put_object("src", content(b"data")).await.unwrap();
        folder.move_object("src", "dst").await.unwrap();
        assert!(!folder.exists("src").await.unwrap());
        assert_eq!(read_all(&folder, "dst").await, b"data");
    }

    #[tokio::test]
    async fn test_cancelled_put_fails() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let err = folder
            .put_object_cancellable("obj", content(b"data"), token)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend { .. }));
        assert!(!folder.exists("obj").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let folder = folder_in(&dir);
        assert!(folder.put_object("../escape", content(b"bad")).await.is_err());
        assert!(folder.read_object("../../etc/passwd").await.is_err());
    }

    #[test]
    fn test_digest_is_pure() {
        let dir = tempfile::tempdir().unwrap();
        let a = folder_in(&dir);
        let b = folder_in(&dir);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), a.subfolder("sub").digest());
    }
}
