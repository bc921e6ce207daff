//! Snapshot naming: where a capture taken at a given moment is stored.
//!
//! Layout is `<root>/<YYYY>/<YYYY-MM-DD_HHMMSS>.jpg`.  Names have one-second
//! granularity; captures are serialized and each one spends several seconds
//! in its notification delays, so two captures never share a name.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime};

/// strftime pattern for the file stem.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Extension of every stored snapshot.
pub const SNAPSHOT_EXTENSION: &str = "jpg";

/// One successful capture: when it was taken and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub taken_at: NaiveDateTime,
    pub path: PathBuf,
}

impl CaptureRecord {
    /// Derive the storage path for a capture taken at local time `taken_at`.
    pub fn new(root: &Path, taken_at: NaiveDateTime) -> Self {
        let path = year_dir(root, taken_at).join(format!(
            "{}.{SNAPSHOT_EXTENSION}",
            taken_at.format(TIMESTAMP_FORMAT)
        ));
        CaptureRecord { taken_at, path }
    }

    /// The year-level directory that must exist before saving.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }
}

/// `<root>/<YYYY>`.
pub fn year_dir(root: &Path, taken_at: NaiveDateTime) -> PathBuf {
    root.join(format!("{:04}", taken_at.year()))
}

/// Recover the capture time from a snapshot path.
///
/// Returns `None` for anything that is not a `.jpg` named with
/// [`TIMESTAMP_FORMAT`].
pub fn parse_snapshot_name(path: &Path) -> Option<NaiveDateTime> {
    if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT).ok()
}
