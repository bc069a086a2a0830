//! Duplicate groups as read from the index.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] is every index entry sharing one fingerprint. Groups
//! are derived on demand by [`crate::index::FileIndex::groups_by_fingerprint`]
//! and never persisted. Members arrive in ascending path order.
//!
//! # Example
//!
//! ```
//! use dupedb::duplicates::DuplicateGroup;
//! use dupedb::index::IndexEntry;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let now = SystemTime::now();
//! let group = DuplicateGroup::new(
//!     [7u8; 32],
//!     vec![
//!         IndexEntry::new(PathBuf::from("/a.txt"), 1024, [7u8; 32], now),
//!         IndexEntry::new(PathBuf::from("/b.txt"), 1024, [7u8; 32], now),
//!     ],
//! );
//!
//! assert_eq!(group.duplicate_count(), 1);
//! assert_eq!(group.wasted_space(), 1024);
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::index::IndexEntry;
use crate::scanner::Hash;

/// Index entries sharing one content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Shared fingerprint (BLAKE3 by default)
    pub hash: Hash,
    /// File size in bytes, taken from the first member
    pub size: u64,
    /// Members in ascending path order
    pub files: Vec<IndexEntry>,
}

impl DuplicateGroup {
    /// Create a group from its members.
    #[must_use]
    pub fn new(hash: Hash, files: Vec<IndexEntry>) -> Self {
        let size = files.first().map_or(0, |f| f.size);
        Self { hash, size, files }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Space held by all copies but one.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        if self.files.len() > 1 {
            self.total_size().saturating_sub(self.size)
        } else {
            0
        }
    }

    /// Number of redundant copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Hash as hexadecimal string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        crate::scanner::hash_to_hex(&self.hash)
    }

    /// Paths of the members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}
