//! Backup naming conventions.
//!
//! A completed backup is denoted by a sentinel object directly under the base
//! backup folder, named `<backup-name>_backup_stop_sentinel.json`. Everything
//! the catalog knows about a backup is derived from that name:
//!
//! * an optional numeric generation suffix (`base_XYZ.2` supersedes
//!   `base_XYZ.1` and the bare `base_XYZ`),
//! * an optional UTC timestamp encoded as `_YYYYMMDDThhmmssZ`,
//! * an optional starting WAL segment for `base_<24 hex>` names.

use crate::SENTINEL_SUFFIX;
use std::sync::LazyLock;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use walvault_storage::Object;

static ENCODED_TIME: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"_([0-9]{8}T[0-9]{6})Z$").unwrap());
static WAL_SEGMENT: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^base_([0-9A-Fa-f]{24})").unwrap());
static TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]");

/// One resolved backup, as reported by the selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTime {
    /// Full backup name, including any generation suffix.
    pub backup_name: String,
    /// Creation time, when the name encodes one or the listing reported one.
    pub time: Option<OffsetDateTime>,
    /// Starting WAL segment, for names of the form `base_<24 hex digits>`.
    pub wal_file_name: Option<String>,
}

impl BackupTime {
    /// Builds a `BackupTime` from a backup name alone, without a listing.
    ///
    /// Used by the exact-name selector, which probes a single sentinel
    /// instead of listing the folder and so has no modification time to
    /// fall back on.
    pub fn from_name(backup_name: impl Into<String>) -> Self {
        let backup_name = backup_name.into();
        let (base, _) = split_generation(&backup_name);
        Self {
            time: encoded_time(base),
            wal_file_name: wal_segment(&backup_name),
            backup_name,
        }
    }
}

/// Returns the sentinel object name for a backup.
pub fn sentinel_name(backup_name: &str) -> String {
    format!("{backup_name}{SENTINEL_SUFFIX}")
}

/// Strips the sentinel suffix, returning the backup name.
pub(crate) fn strip_sentinel(object_name: &str) -> Option<&str> {
    object_name.strip_suffix(SENTINEL_SUFFIX)
}

/// Splits a trailing `.<N>` generation suffix off a backup name.
///
/// A suffix only counts as a generation when it is entirely numeric and fits
/// in a `u32`; anything else (including `base.tar`) is part of the name.
pub(crate) fn split_generation(backup_name: &str) -> (&str, u32) {
    if let Some((base, suffix)) = backup_name.rsplit_once('.')
        && !suffix.is_empty()
        && suffix.bytes().all(|byte| byte.is_ascii_digit())
        && let Ok(generation) = suffix.parse::<u32>()
    {
        return (base, generation);
    }
    (backup_name, 0)
}

/// Extracts a UTC timestamp encoded at the end of a backup name.
pub(crate) fn encoded_time(base_name: &str) -> Option<OffsetDateTime> {
    let captured = ENCODED_TIME.captures(base_name)?;
    let parsed = PrimitiveDateTime::parse(&captured[1], TIME_FORMAT).ok()?;
    Some(parsed.assume_utc())
}

/// Extracts the starting WAL segment from a `base_<24 hex>` name.
pub(crate) fn wal_segment(backup_name: &str) -> Option<String> {
    Some(WAL_SEGMENT.captures(backup_name)?[1].to_string())
}

/// A backup discovered by listing the base backup folder.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) name: String,
    base: String,
    generation: u32,
    pub(crate) time: OffsetDateTime,
}

impl Candidate {
    /// Recognises a sentinel object, falling back to the object's
    /// modification time when the name encodes none.
    pub(crate) fn from_object(object: &Object) -> Option<Self> {
        let name = strip_sentinel(&object.name)?;
        let (base, generation) = split_generation(name);
        Some(Self {
            name: name.to_string(),
            base: base.to_string(),
            generation,
            time: encoded_time(base).unwrap_or(object.last_modified),
        })
    }

    /// Ordering key: later base names win, then higher generations.
    ///
    /// Generations compare numerically, so `.10` supersedes `.9` even though
    /// it sorts lower lexicographically.
    pub(crate) fn rank(&self) -> (&str, u32) {
        (&self.base, self.generation)
    }

    pub(crate) fn into_backup_time(self) -> BackupTime {
        BackupTime {
            wal_file_name: wal_segment(&self.name),
            time: Some(self.time),
            backup_name: self.name,
        }
    }
}
