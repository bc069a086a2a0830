//! JSON output formatter for resolved duplicate groups.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "hash": "abc123...",
//!       "size": 1024,
//!       "original": "/path/to/keep.txt",
//!       "duplicates": ["/path/to/copy.txt"],
//!       "protected": []
//!     }
//!   ],
//!   "summary": {
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "protected_files": 0,
//!     "reclaimable_space": 1024,
//!     "exit_code": 0,
//!     "exit_code_name": "DD000"
//!   }
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::duplicates::ResolvedGroup;
use crate::error::ExitCode;

/// A single resolved group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Fingerprint as hexadecimal string (64 characters)
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// The copy to keep
    pub original: String,
    /// Copies to remove
    pub duplicates: Vec<String>,
    /// Copies kept in preferred directories
    pub protected: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Create a JSON group from a resolved group.
    #[must_use]
    pub fn from_resolved(group: &ResolvedGroup) -> Self {
        let paths = |entries: &[crate::index::IndexEntry]| {
            entries
                .iter()
                .map(|e| e.path.to_string_lossy().to_string())
                .collect()
        };
        Self {
            hash: group.fingerprint_hex(),
            size: group.size,
            original: group.original.path.to_string_lossy().to_string(),
            duplicates: paths(&group.duplicates),
            protected: paths(&group.protected),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Number of removable copies
    pub duplicate_files: usize,
    /// Number of copies kept in preferred directories
    pub protected_files: usize,
    /// Bytes freed by removing every duplicate
    pub reclaimable_space: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DD000")
    pub exit_code_name: String,
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Resolved groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Totals
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the document from resolved groups.
    #[must_use]
    pub fn new(groups: &[ResolvedGroup], exit_code: ExitCode) -> Self {
        Self {
            duplicates: groups.iter().map(JsonDuplicateGroup::from_resolved).collect(),
            summary: JsonSummary {
                duplicate_groups: groups.len(),
                duplicate_files: groups.iter().map(|g| g.duplicates.len()).sum(),
                protected_files: groups.iter().map(|g| g.protected.len()).sum(),
                reclaimable_space: groups.iter().map(ResolvedGroup::reclaimable).sum(),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)
    }
}
