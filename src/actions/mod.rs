//! File actions module.
//!
//! Removal of resolved duplicates, permanently or via the system trash,
//! with per-file verification and an optional deletion log sink.
//!
//! ```no_run
//! use dupedb::actions::delete::permanent_delete;
//! use std::path::Path;
//!
//! permanent_delete(Path::new("/path/to/duplicate.txt")).unwrap();
//! ```

pub mod delete;

pub use delete::{
    delete_to_trash, permanent_delete, DeleteConfig, DeleteError, DeleteMethod, DeletionExecutor,
    DeletionOutcome, DeletionRecord, DeletionReport, DeletionSink,
};
