//! Storage object model.
//!
//! These types represent stored items as reported by listing operations.
//! They are plain immutable values; mutating one never touches the backend.

use time::OffsetDateTime;

/// Metadata for one stored object, produced only by [`Folder::list`](crate::Folder::list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Name relative to the folder that listed it (no `/`).
    pub name: String,
    /// Last modified timestamp as reported by the backend.
    pub last_modified: OffsetDateTime,
    /// Object size in bytes.
    pub size: u64,
}

impl Object {
    pub fn new(name: impl Into<String>, last_modified: OffsetDateTime, size: u64) -> Self {
        Self { name: name.into(), last_modified, size }
    }
}

/// 64-bit identity digest of a folder.
///
/// A pure function of backend kind, host, root path and user: two handles
/// pointing at the same backend root always produce equal digests, without
/// opening a connection. Higher layers use it to key caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderDigest(pub u64);

/// Computes a [`FolderDigest`] from the identity parts of a folder.
///
/// First 8 bytes of a BLAKE3 digest over the length-prefixed parts. The
/// length prefix keeps `("ab", "c")` and `("a", "bc")` distinct.
pub fn digest_parts(parts: &[&str]) -> FolderDigest {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let mut out = [0u8; 8];
    out.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    FolderDigest(u64::from_le_bytes(out))
}
