//! Backup selection.
//!
//! Each selector resolves "which backup?" against a storage folder. All of
//! them except [`NamedBackupSelector`] list the base backup folder once and
//! pick from the sentinels found there; the named selector probes a single
//! object instead.

use crate::error::{ErrorKind, Result};
use crate::name::{BackupTime, Candidate, sentinel_name};
use crate::BASE_BACKUP_PATH;
use async_trait::async_trait;
use exn::ResultExt;
use time::OffsetDateTime;
use walvault_storage::Folder;

/// Resolves a single backup from the catalog.
#[async_trait]
pub trait BackupSelector: Send + Sync {
    async fn select(&self, folder: &dyn Folder) -> Result<BackupTime>;
}

/// Lists the base backup folder and parses its sentinels.
///
/// Sub-folders are ignored: sentinels only count when they sit directly
/// under the base backup path.
async fn backup_candidates(folder: &dyn Folder) -> Result<Vec<Candidate>> {
    let listing = folder
        .subfolder(BASE_BACKUP_PATH)
        .list()
        .await
        .map_err(ErrorKind::storage)?;
    Ok(listing.objects.iter().filter_map(Candidate::from_object).collect())
}

/// Lists every completed backup, oldest first.
pub async fn list_backup_times(folder: &dyn Folder) -> Result<Vec<BackupTime>> {
    let mut candidates = backup_candidates(folder).await?;
    candidates.sort_by(|a, b| a.rank().cmp(&b.rank()));
    Ok(candidates.into_iter().map(Candidate::into_backup_time).collect())
}

/// Selects the most recent completed backup.
pub struct LatestBackupSelector;

#[async_trait]
impl BackupSelector for LatestBackupSelector {
    async fn select(&self, folder: &dyn Folder) -> Result<BackupTime> {
        let candidates = backup_candidates(folder).await?;
        let Some(latest) = candidates.into_iter().max_by(|a, b| a.rank().cmp(&b.rank())) else {
            exn::bail!(ErrorKind::NoBackupsFound);
        };
        tracing::info!(backup = %latest.name, "resolved latest backup");
        Ok(latest.into_backup_time())
    }
}

/// Selects a backup by its exact name.
///
/// Probes the sentinel directly instead of listing, so resolution stays O(1)
/// however large the catalog grows.
pub struct NamedBackupSelector {
    name: String,
}

impl NamedBackupSelector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl BackupSelector for NamedBackupSelector {
    async fn select(&self, folder: &dyn Folder) -> Result<BackupTime> {
        let base = folder.subfolder(BASE_BACKUP_PATH);
        let found = base
            .exists(&sentinel_name(&self.name))
            .await
            .map_err(ErrorKind::storage)?;
        if !found {
            exn::bail!(ErrorKind::BackupNotFound(self.name.clone()));
        }
        tracing::info!(backup = %self.name, "resolved backup by name");
        Ok(BackupTime::from_name(&self.name))
    }
}

/// Selects the most recent backup whose name matches a regex.
#[derive(Debug)]
pub struct PatternBackupSelector {
    pattern: regex::Regex,
}

impl PatternBackupSelector {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = regex::Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
        Ok(Self { pattern })
    }
}

#[async_trait]
impl BackupSelector for PatternBackupSelector {
    async fn select(&self, folder: &dyn Folder) -> Result<BackupTime> {
        let candidates = backup_candidates(folder).await?;
        let Some(latest) = candidates
            .into_iter()
            .filter(|candidate| self.pattern.is_match(&candidate.name))
            .max_by(|a, b| a.rank().cmp(&b.rank()))
        else {
            exn::bail!(ErrorKind::NoBackupsFound);
        };
        tracing::info!(backup = %latest.name, pattern = %self.pattern, "resolved backup by pattern");
        Ok(latest.into_backup_time())
    }
}

/// Selects the most recent backup created strictly before a point in time.
pub struct BeforeTimeBackupSelector {
    bound: OffsetDateTime,
}

impl BeforeTimeBackupSelector {
    pub fn new(bound: OffsetDateTime) -> Self {
        Self { bound }
    }
}

#[async_trait]
impl BackupSelector for BeforeTimeBackupSelector {
    async fn select(&self, folder: &dyn Folder) -> Result<BackupTime> {
        let candidates = backup_candidates(folder).await?;
        let Some(latest) = candidates
            .into_iter()
            .filter(|candidate| candidate.time < self.bound)
            .max_by(|a, b| a.rank().cmp(&b.rank()))
        else {
            exn::bail!(ErrorKind::NoBackupsFound);
        };
        tracing::info!(backup = %latest.name, bound = %self.bound, "resolved backup before time");
        Ok(latest.into_backup_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use walvault_storage::FolderHandle;
    use walvault_storage::backend::MemoryFolder;

    fn sentinel_key(backup_name: &str) -> String {
        format!("{BASE_BACKUP_PATH}{}", sentinel_name(backup_name))
    }

    fn catalog(backup_names: &[&str]) -> FolderHandle {
        MemoryFolder::with_objects(
            backup_names
                .iter()
                .map(|name| (sentinel_key(name), Vec::from(*b"{}"))),
        )
    }

    #[tokio::test]
    async fn test_latest_empty_catalog() {
        let folder = MemoryFolder::with_objects([("unrelated.json", Vec::from(*b"{}"))]);
        let err = LatestBackupSelector.select(&*folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoBackupsFound));
    }

    #[tokio::test]
    async fn test_latest_prefers_higher_generation() {
        let folder = catalog(&["stream_20231118T120000Z.1", "stream_20231118T120000Z.2"]);
        let backup = LatestBackupSelector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "stream_20231118T120000Z.2");
        assert_eq!(backup.time, Some(datetime!(2023-11-18 12:00:00 UTC)));
    }

    #[tokio::test]
    async fn test_generation_compares_numerically() {
        let folder = catalog(&["backup_1.9", "backup_1.10"]);
        let backup = LatestBackupSelector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "backup_1.10");
    }

    #[tokio::test]
    async fn test_latest_ignores_nested_sentinels() {
        let folder = catalog(&["backup_1.1", "backup_2.2", "subfolder/backup_3.3"]);
        let backup = LatestBackupSelector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "backup_2.2");
    }

    #[tokio::test]
    async fn test_list_backup_times_sorted() {
        let folder = catalog(&["backup_2.2", "backup_1.1", "backup_1"]);
        let backups = list_backup_times(&*folder).await.unwrap();
        let names: Vec<_> = backups.iter().map(|backup| backup.backup_name.as_str()).collect();
        assert_eq!(names, vec!["backup_1", "backup_1.1", "backup_2.2"]);
    }

    #[tokio::test]
    async fn test_named_found() {
        let folder = catalog(&["base_000000010000000000000002"]);
        let selector = NamedBackupSelector::new("base_000000010000000000000002");
        let backup = selector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "base_000000010000000000000002");
        assert_eq!(backup.wal_file_name, Some("000000010000000000000002".to_string()));
    }

    #[tokio::test]
    async fn test_named_not_found() {
        let folder = catalog(&["backup_1"]);
        let selector = NamedBackupSelector::new("backup_2");
        let err = selector.select(&*folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackupNotFound(name) if name == "backup_2"));
    }

    #[tokio::test]
    async fn test_pattern_selects_latest_match() {
        let folder = catalog(&["stream_20230101T000000Z", "base_20230601T000000Z", "stream_20230901T000000Z"]);
        let selector = PatternBackupSelector::new("^stream_").unwrap();
        let backup = selector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "stream_20230901T000000Z");
    }

    #[tokio::test]
    async fn test_pattern_no_match() {
        let folder = catalog(&["backup_1"]);
        let selector = PatternBackupSelector::new("^stream_").unwrap();
        let err = selector.select(&*folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoBackupsFound));
    }

    #[test]
    fn test_pattern_invalid() {
        let err = PatternBackupSelector::new("[").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPattern(_)));
    }

    #[tokio::test]
    async fn test_before_time_bound_is_strict() {
        let folder = catalog(&["stream_20230101T000000Z", "stream_20230601T000000Z"]);

        let selector = BeforeTimeBackupSelector::new(datetime!(2023-06-01 00:00:00 UTC));
        let backup = selector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "stream_20230101T000000Z");

        let selector = BeforeTimeBackupSelector::new(datetime!(2023-06-01 00:00:01 UTC));
        let backup = selector.select(&*folder).await.unwrap();
        assert_eq!(backup.backup_name, "stream_20230601T000000Z");

        let selector = BeforeTimeBackupSelector::new(datetime!(2023-01-01 00:00:00 UTC));
        let err = selector.select(&*folder).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoBackupsFound));
    }
}
