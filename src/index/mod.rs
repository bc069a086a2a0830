//! Persistent file index for dupedb.
//!
//! The index maps absolute file paths to their size, modification time and
//! content fingerprint, and answers "which files share this fingerprint?"
//! without loading the whole catalog into memory.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence, schema versioning and the lazy
//!   entry/group iterators.
//! * [`entry`]: The [`IndexEntry`] record and its staleness checks.
//!
//! # Staleness
//!
//! An entry is trusted while the file's size and modification time still
//! match what was recorded alongside the fingerprint. Any difference means the
//! file is fingerprinted again on the next scan with `skip_existing`.
//!
//! # Example
//!
//! ```no_run
//! use dupedb::index::FileIndex;
//! use std::path::Path;
//!
//! let index = FileIndex::open(Path::new("index.db")).unwrap();
//! for group in index.groups_by_fingerprint(None).unwrap() {
//!     let group = group.unwrap();
//!     println!("{} copies of {}", group.len(), group.hash_hex());
//! }
//! ```

pub mod database;
pub mod entry;

pub use database::{
    EntryIter, FileIndex, GroupIter, IndexError, IndexResult, IndexStats, SCHEMA_VERSION,
};
pub use entry::IndexEntry;
