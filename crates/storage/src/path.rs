//! Storage path helpers.
//!
//! Storage paths are `/`-delimited key strings relative to a folder root,
//! regardless of backend. This module validates relative paths (no escaping
//! the folder root) and joins them onto root paths.

use crate::error::{ErrorKind, Result};

/// Validates a relative storage path and normalizes it.
///
/// Rejects empty paths, absolute paths, null bytes, and any `..` sequence
/// that would escape the folder root. Redundant separators and `.` segments
/// are collapsed.
///
/// # Examples
///
/// ```
/// use walvault_storage::path::validate;
/// assert_eq!(validate("basebackups_005/base_01").unwrap(), "basebackups_005/base_01");
/// assert_eq!(validate("a//./b/").unwrap(), "a/b");
/// assert!(validate("../etc/passwd").is_err());
/// assert!(validate("a/../../b").is_err());
/// ```
pub fn validate(path: &str) -> Result<String> {
    if path.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(path.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_string()));
                }
            }
            normal => segments.push(normal),
        }
    }
    if segments.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}

/// Joins a (possibly empty) root path and a relative path with a single `/`.
pub fn join(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    if base.is_empty() {
        relative.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

/// Appends a trailing `/` so the path can serve as a folder root.
pub fn ensure_trailing_slash(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("file.json").unwrap(), "file.json");
        assert_eq!(validate("a/b/c").unwrap(), "a/b/c");
        assert_eq!(validate("basebackups_005/").unwrap(), "basebackups_005");
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b//c").unwrap(), "a/b/c");
        assert_eq!(validate("a/./b/./c").unwrap(), "a/b/c");
        assert_eq!(validate("/leading").unwrap(), "leading");
        // Traversal that remains within the root resolves
        assert_eq!(validate("a/b/..").unwrap(), "a");
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_invalid() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
        assert!(validate("a\0b").is_err());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("backups/", "base_01"), "backups/base_01");
        assert_eq!(join("backups", "base_01"), "backups/base_01");
        assert_eq!(join("", "base_01"), "base_01");
        assert_eq!(join("backups/", "/base_01"), "backups/base_01");
    }

    #[test]
    fn test_ensure_trailing_slash() {
        assert_eq!(ensure_trailing_slash("backups"), "backups/");
        assert_eq!(ensure_trailing_slash("backups/"), "backups/");
        assert_eq!(ensure_trailing_slash(""), "");
    }
}
