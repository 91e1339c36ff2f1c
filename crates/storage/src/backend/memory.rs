//! In-memory storage backend for testing.
//!
//! All folder handles derived from one root share the same key/value store,
//! so catalog and orchestration tests can exercise the full
//! [`Folder`](crate::Folder) contract without filesystem or network
//! dependencies.

use crate::error::{ErrorKind, Result};
use crate::folder::{BoxSyncRead, Folder, FolderHandle, Listing};
use crate::object::{FolderDigest, Object, digest_parts};
use crate::path;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::task;

struct Entry {
    modified: OffsetDateTime,
    data: Vec<u8>,
}

type Store = Arc<RwLock<BTreeMap<String, Entry>>>;

/// In-memory folder for tests.
///
/// # Examples
///
/// ```
/// use walvault_storage::backend::MemoryFolder;
/// use std::io::Cursor;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> walvault_storage::Result<()> {
/// let folder = MemoryFolder::new();
/// folder.put_object("wal_001", Box::new(Cursor::new(b"bytes".to_vec()))).await?;
/// assert!(folder.exists("wal_001").await?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryFolder {
    store: Store,
    /// Storage path with a trailing `/` (empty for the root).
    path: String,
}

impl MemoryFolder {
    /// Creates an empty root folder.
    pub fn new() -> FolderHandle {
        Arc::new(Self {
            store: Arc::new(RwLock::new(BTreeMap::new())),
            path: String::new(),
        })
    }

    /// Creates a root folder pre-populated with objects.
    ///
    /// Panics on invalid paths: if test setup is wrong, the test should not
    /// pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> FolderHandle {
        let now = OffsetDateTime::now_utc();
        let mut map = BTreeMap::new();
        for (key, data) in objects {
            let key = key.into();
            let validated = match path::validate(&key) {
                Ok(validated) => validated,
                Err(_) => panic!("MemoryFolder::with_objects: invalid path {key}"),
            };
            map.insert(validated, Entry { modified: now, data: data.into() });
        }
        Arc::new(Self {
            store: Arc::new(RwLock::new(map)),
            path: String::new(),
        })
    }

    fn key(&self, relative_path: &str) -> Result<String> {
        Ok(path::join(&self.path, &path::validate(relative_path)?))
    }
}

#[async_trait]
impl Folder for MemoryFolder {
    fn path(&self) -> &str {
        &self.path
    }

    fn subfolder(&self, relative_path: &str) -> FolderHandle {
        Arc::new(Self {
            store: Arc::clone(&self.store),
            path: path::ensure_trailing_slash(&path::join(&self.path, relative_path)),
        })
    }

    fn digest(&self) -> FolderDigest {
        digest_parts(&["memory", "", &self.path, ""])
    }

    async fn list(&self) -> Result<Listing> {
        let guard = self.store.read().await;
        let mut listing = Listing::default();
        let mut seen_subfolders = BTreeSet::new();
        for (key, entry) in guard.iter() {
            let Some(rest) = key.strip_prefix(&self.path) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('/') {
                // Deeper keys surface only as an immediate sub-folder name.
                Some((subfolder, _)) => {
                    seen_subfolders.insert(subfolder.to_string());
                }
                None => {
                    listing.objects.push(Object::new(rest, entry.modified, entry.data.len() as u64));
                }
            }
        }
        drop(guard);
        for name in seen_subfolders {
            listing.subfolders.push(self.subfolder(&name));
        }
        Ok(listing)
    }

    async fn exists(&self, relative_path: &str) -> Result<bool> {
        let key = self.key(relative_path)?;
        Ok(self.store.read().await.contains_key(&key))
    }

    async fn read_object(&self, relative_path: &str) -> Result<BoxSyncRead> {
        let key = self.key(relative_path)?;
        let guard = self.store.read().await;
        let entry = guard.get(&key);
        match entry {
            Some(entry) => Ok(Box::new(Cursor::new(entry.data.clone())) as BoxSyncRead),
            None => exn::bail!(ErrorKind::ObjectNotFound(key)),
        }
    }

    async fn put_object(&self, name: &str, content: BoxSyncRead) -> Result<()> {
        let key = self.key(name)?;
        let mut content = content;
        let error_key = key.clone();
        let data: Vec<u8> = task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut content, &mut buf)
                .or_raise(|| ErrorKind::backend("write object", error_key))?;
            Ok(buf)
        })
        .await
        .or_raise(|| ErrorKind::backend("write object", key.clone()))??;
        self.store
            .write()
            .await
            .insert(key, Entry { modified: OffsetDateTime::now_utc(), data });
        Ok(())
    }

    async fn delete_objects(&self, relative_paths: &[&str]) -> Result<()> {
        let mut guard = self.store.write().await;
        for relative in relative_paths {
            let key = path::join(&self.path, &path::validate(relative)?);
            // Absent keys and directory prefixes are silent no-ops.
            guard.remove(&key);
        }
        Ok(())
    }
}
