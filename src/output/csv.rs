//! CSV output formatter for resolved duplicate groups.
//!
//! One row is generated for each member of each group.
//!
//! # Columns
//!
//! - `group_id`: Numeric ID identifying the duplicate group (1-based)
//! - `hash`: Content fingerprint (hexadecimal)
//! - `role`: `original`, `duplicate` or `protected`
//! - `path`: Absolute path to the file
//! - `size`: File size in bytes
//! - `modified`: Modification time recorded in the index (RFC 3339)
//!
//! # Example
//!
//! ```no_run
//! use dupedb::duplicates::{GroupResolver, PreferenceOrder};
//! use dupedb::index::FileIndex;
//! use dupedb::output::csv::CsvOutput;
//! use std::path::Path;
//!
//! let index = FileIndex::open(Path::new("index.db")).unwrap();
//! let groups = GroupResolver::new(&index)
//!     .resolve_all(&PreferenceOrder::empty(), None)
//!     .unwrap();
//!
//! CsvOutput::new(&groups).write_to(std::io::stdout()).unwrap();
//! ```

use std::io;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::ResolvedGroup;
use crate::index::IndexEntry;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Role of a file within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The copy that is kept
    Original,
    /// A removable copy
    Duplicate,
    /// A copy kept because it is in a preferred directory
    Protected,
}

/// A single row in the CSV output.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_id: usize,
    hash: &'a str,
    role: Role,
    path: String,
    size: u64,
    modified: String,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    groups: &'a [ResolvedGroup],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a [ResolvedGroup]) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for (idx, group) in self.groups.iter().enumerate() {
            let group_id = idx + 1;
            let hash_hex = group.fingerprint_hex();

            let members = std::iter::once((Role::Original, &group.original))
                .chain(group.duplicates.iter().map(|d| (Role::Duplicate, d)))
                .chain(group.protected.iter().map(|p| (Role::Protected, p)));

            for (role, entry) in members {
                csv_writer.serialize(CsvRow {
                    group_id,
                    hash: &hash_hex,
                    role,
                    path: entry.path.to_string_lossy().to_string(),
                    size: entry.size,
                    modified: format_modified(entry),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

/// Recorded modification time in RFC 3339.
pub(crate) fn format_modified(entry: &IndexEntry) -> String {
    let datetime: DateTime<Utc> = entry.modified.into();
    datetime.to_rfc3339()
}
