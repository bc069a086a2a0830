//! Index entry definitions.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::directory_depth;
use crate::scanner::{hash_to_hex, FileEntry, Hash};

/// One cataloged file.
///
/// When `fingerprint` is present, `size` and `modified` describe the file as
/// it was when the fingerprint was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Absolute, canonical path (unique key)
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Content fingerprint, if the file has been hashed
    pub fingerprint: Option<Hash>,
    /// Modification time recorded alongside the fingerprint
    pub modified: SystemTime,
    /// When the entry was last (re)fingerprinted
    pub last_checked: Option<DateTime<Utc>>,
}

impl IndexEntry {
    /// Create a fingerprinted entry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, fingerprint: Hash, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            fingerprint: Some(fingerprint),
            modified,
            last_checked: None,
        }
    }

    /// Number of normal path components, used as the "more canonical" tie-break.
    #[must_use]
    pub fn directory_depth(&self) -> usize {
        directory_depth(&self.path)
    }

    /// Fingerprint as hexadecimal, or an empty string when absent.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.as_ref().map(hash_to_hex).unwrap_or_default()
    }

    /// Whether the recorded size/mtime no longer describe the file.
    #[must_use]
    pub fn is_stale(&self, size: u64, modified: SystemTime) -> bool {
        self.size != size || self.modified != modified
    }

    /// Whether this entry can be trusted for the walked file `file`.
    #[must_use]
    pub fn is_current_for(&self, file: &FileEntry) -> bool {
        self.fingerprint.is_some() && !self.is_stale(file.size, file.modified)
    }

    /// Compare the entry against the file currently on disk.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from reading the file's metadata (including
    /// `NotFound` when the file is gone).
    pub fn is_stale_on_disk(&self) -> io::Result<bool> {
        let metadata = fs::metadata(&self.path)?;
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        Ok(self.is_stale(metadata.len(), modified))
    }
}

/// Split a timestamp into (seconds, nanoseconds) relative to the Unix epoch.
///
/// Times before the epoch give negative seconds with a non-negative
/// nanosecond part, so the pair always round-trips exactly.
#[must_use]
pub fn time_to_parts(time: SystemTime) -> (i64, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            if d.subsec_nanos() == 0 {
                (-(d.as_secs() as i64), 0)
            } else {
                (-(d.as_secs() as i64) - 1, 1_000_000_000 - d.subsec_nanos())
            }
        }
    }
}

/// Inverse of [`time_to_parts`].
#[must_use]
pub fn parts_to_time(secs: i64, nanos: u32) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(u64::from(nanos))
    }
}
