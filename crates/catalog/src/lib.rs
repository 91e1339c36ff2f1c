pub mod error;
mod name;
mod selector;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::name::{BackupTime, sentinel_name};
pub use crate::selector::{
    BackupSelector, BeforeTimeBackupSelector, LatestBackupSelector, NamedBackupSelector, PatternBackupSelector,
    list_backup_times,
};

/// Root of base backups within a storage folder.
pub const BASE_BACKUP_PATH: &str = "basebackups_005/";
/// Suffix of the marker object whose presence denotes a completed backup.
pub const SENTINEL_SUFFIX: &str = "_backup_stop_sentinel.json";
