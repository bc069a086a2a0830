//! Output formatters for resolved duplicate groups and deletion runs.
//!
//! - [`text`] for terminals
//! - [`json`] for automation and scripting
//! - [`csv`] for spreadsheet import
//! - [`deletion_log`] records every deletion attempt as CSV
//!
//! # Example
//!
//! ```no_run
//! use dupedb::duplicates::{GroupResolver, PreferenceOrder};
//! use dupedb::error::ExitCode;
//! use dupedb::index::FileIndex;
//! use dupedb::output::JsonOutput;
//! use std::path::Path;
//!
//! let index = FileIndex::open(Path::new("index.db")).unwrap();
//! let groups = GroupResolver::new(&index)
//!     .resolve_all(&PreferenceOrder::empty(), None)
//!     .unwrap();
//! println!("{}", JsonOutput::new(&groups, ExitCode::Success).to_json_pretty().unwrap());
//! ```

pub mod csv;
pub mod deletion_log;
pub mod json;
pub mod text;

// Re-export main types
pub use self::csv::{CsvOutput, CsvOutputError, Role};
pub use deletion_log::{DeletionLog, LogMode};
pub use json::JsonOutput;
pub use text::TextOutput;
