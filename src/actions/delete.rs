//! Removal of resolved duplicates.
//!
//! # Overview
//!
//! [`DeletionExecutor::execute`] walks the duplicates of each
//! [`ResolvedGroup`] and, per file:
//! - in simulate mode, records [`DeletionOutcome::Simulated`] and touches
//!   nothing;
//! - otherwise checks the file still matches its index entry and the group's
//!   original still exists, deletes it (permanently or to the system trash),
//!   and removes its index entry.
//!
//! A failure is recorded against that file only; the batch continues.
//! The group's original is never passed to a delete call.
//!
//! # Example
//!
//! ```no_run
//! use dupedb::actions::{DeleteConfig, DeletionExecutor};
//! use dupedb::duplicates::{GroupResolver, PreferenceOrder};
//! use dupedb::index::FileIndex;
//! use std::path::Path;
//!
//! let index = FileIndex::open(Path::new("index.db")).unwrap();
//! let groups = GroupResolver::new(&index)
//!     .resolve_all(&PreferenceOrder::empty(), None)
//!     .unwrap();
//!
//! let executor = DeletionExecutor::new(&index, DeleteConfig::default());
//! let report = executor.execute(&groups, true);
//! println!("{}", report.summary());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::duplicates::ResolvedGroup;
use crate::index::{FileIndex, IndexEntry};
use crate::progress::ProgressCallback;

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since it was fingerprinted.
    #[error("modified since scan: {0}")]
    Modified(PathBuf),

    /// The group's original no longer exists.
    #[error("original missing: {0}")]
    OriginalMissing(PathBuf),

    /// The path is the group's original.
    #[error("refusing to delete the original: {0}")]
    IsOriginal(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Reason reported by the platform trash
        message: String,
    },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed {
        /// File that could not be removed
        path: PathBuf,
        /// Reason reported by the filesystem
        message: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::OriginalMissing(p)
            | Self::IsOriginal(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    /// Short reason suitable for the deletion log.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound(_) => "file not found".to_string(),
            Self::PermissionDenied(_) => "permission denied".to_string(),
            Self::Modified(_) => "modified since scan".to_string(),
            Self::OriginalMissing(_) => "original missing".to_string(),
            Self::IsOriginal(_) => "is the original".to_string(),
            Self::TrashFailed { message, .. } | Self::PermanentDeleteFailed { message, .. } => {
                message.clone()
            }
            Self::Io { source, .. } => source.to_string(),
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// How a file is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMethod {
    /// Unlink the file.
    #[default]
    Permanent,
    /// Move the file to the system trash.
    Trash,
}

/// Configuration for deletion operations.
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    /// How files are removed.
    pub method: DeleteMethod,
    /// Check size/mtime against the index and the original's presence
    /// before each removal.
    pub verify: bool,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            method: DeleteMethod::Permanent,
            verify: true,
        }
    }
}

impl DeleteConfig {
    /// Create config for trash deletion.
    #[must_use]
    pub fn trash() -> Self {
        Self {
            method: DeleteMethod::Trash,
            ..Self::default()
        }
    }

    /// Set the removal method.
    #[must_use]
    pub fn with_method(mut self, method: DeleteMethod) -> Self {
        self.method = method;
        self
    }

    /// Enable/disable pre-deletion verification.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// Result of one deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The file was removed and its index entry dropped.
    Deleted,
    /// Simulate mode: the file would have been removed.
    Simulated,
    /// The file was left in place.
    Failed(String),
}

impl DeletionOutcome {
    /// Lowercase label used in logs and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Simulated => "simulated",
            Self::Failed(_) => "failed",
        }
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// One line of the deletion report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    /// Duplicate that was (or would have been) removed
    pub path: PathBuf,
    /// Size recorded in the index
    pub size: u64,
    /// What happened
    pub outcome: DeletionOutcome,
    /// When the attempt was made
    pub timestamp: DateTime<Utc>,
}

/// Receives every deletion record as it is produced.
pub trait DeletionSink {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Returns the underlying write error; the executor stops before the
    /// next file.
    fn record(&mut self, record: &DeletionRecord) -> io::Result<()>;
}

/// All records of one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    /// Per-file records, in processing order.
    pub records: Vec<DeletionRecord>,
    /// Whether shutdown stopped the run early.
    pub interrupted: bool,
    /// Write error that stopped the run, if the sink failed.
    pub log_error: Option<String>,
    /// Deleted files whose index entry could not be dropped; `prune`
    /// removes them later.
    pub stale_entries: Vec<PathBuf>,
}

impl DeletionReport {
    /// Files removed.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Deleted))
    }

    /// Files that would be removed.
    #[must_use]
    pub fn simulated_count(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Simulated))
    }

    /// Files left in place after a failure.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, DeletionOutcome::Failed(_)))
    }

    /// Bytes freed (or that would be freed, in simulate mode).
    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| !matches!(r.outcome, DeletionOutcome::Failed(_)))
            .map(|r| r.size)
            .sum()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let freed = bytesize::ByteSize(self.bytes_freed());
        let mut summary = if self.simulated_count() > 0 {
            format!(
                "Would delete {} file(s), freeing {}",
                self.simulated_count(),
                freed
            )
        } else {
            format!("Deleted {} file(s), freed {}", self.deleted_count(), freed)
        };
        if self.failed_count() > 0 {
            summary.push_str(&format!(", {} failed", self.failed_count()));
        }
        if !self.stale_entries.is_empty() {
            summary.push_str(&format!(
                ", {} index entr{} left for prune",
                self.stale_entries.len(),
                if self.stale_entries.len() == 1 { "y" } else { "ies" }
            ));
        }
        if self.log_error.is_some() {
            summary.push_str(" (stopped: deletion log write failed)");
        }
        if self.interrupted {
            summary.push_str(" (interrupted)");
        }
        summary
    }

    fn count(&self, pred: impl Fn(&DeletionOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Deletes duplicates and keeps the index consistent with disk.
pub struct DeletionExecutor<'a> {
    index: &'a FileIndex,
    config: DeleteConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DeletionExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionExecutor")
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .finish_non_exhaustive()
    }
}

impl<'a> DeletionExecutor<'a> {
    /// Create an executor that updates `index`.
    #[must_use]
    pub fn new(index: &'a FileIndex, config: DeleteConfig) -> Self {
        Self {
            index,
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Remove (or simulate removing) every duplicate in `groups`.
    #[must_use]
    pub fn execute(&self, groups: &[ResolvedGroup], simulate: bool) -> DeletionReport {
        self.run(groups, simulate, None)
    }

    /// Like [`execute`](Self::execute), handing each record to `sink` as it
    /// is produced.
    pub fn execute_with_sink(
        &self,
        groups: &[ResolvedGroup],
        simulate: bool,
        sink: &mut dyn DeletionSink,
    ) -> DeletionReport {
        self.run(groups, simulate, Some(sink))
    }

    fn run(
        &self,
        groups: &[ResolvedGroup],
        simulate: bool,
        mut sink: Option<&mut dyn DeletionSink>,
    ) -> DeletionReport {
        let total: usize = groups.iter().map(|g| g.duplicates.len()).sum();
        let mut report = DeletionReport::default();

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("deleting", total);
        }
        log::info!(
            "{} {} duplicate(s) across {} group(s)",
            if simulate { "Simulating removal of" } else { "Removing" },
            total,
            groups.len()
        );

        'groups: for group in groups {
            for duplicate in &group.duplicates {
                if self.is_shutdown_requested() {
                    log::info!("Shutdown requested, stopping deletion");
                    report.interrupted = true;
                    break 'groups;
                }

                let outcome = if simulate {
                    log::debug!("Would delete {}", duplicate.path.display());
                    DeletionOutcome::Simulated
                } else {
                    match self.delete_one(duplicate, &group.original) {
                        Ok(true) => DeletionOutcome::Deleted,
                        Ok(false) => {
                            report.stale_entries.push(duplicate.path.clone());
                            DeletionOutcome::Deleted
                        }
                        Err(e) => {
                            log::warn!("Failed to delete {}: {}", duplicate.path.display(), e);
                            DeletionOutcome::Failed(e.reason())
                        }
                    }
                };

                let record = DeletionRecord {
                    path: duplicate.path.clone(),
                    size: duplicate.size,
                    outcome,
                    timestamp: Utc::now(),
                };
                let logged = match sink.as_deref_mut() {
                    Some(sink) => sink.record(&record),
                    None => Ok(()),
                };
                report.records.push(record);

                if let Some(ref callback) = self.progress_callback {
                    callback.on_progress(
                        report.records.len(),
                        duplicate.path.to_string_lossy().as_ref(),
                    );
                }

                if let Err(e) = logged {
                    log::error!("Failed to write deletion log entry, stopping: {}", e);
                    report.log_error = Some(e.to_string());
                    break 'groups;
                }
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("deleting");
        }
        log::info!("{}", report.summary());
        report
    }

    /// Remove one duplicate; `Ok(false)` means the file is gone but its index
    /// entry could not be dropped.
    fn delete_one(&self, duplicate: &IndexEntry, original: &IndexEntry) -> Result<bool, DeleteError> {
        if duplicate.path == original.path {
            return Err(DeleteError::IsOriginal(duplicate.path.clone()));
        }

        if self.config.verify {
            match duplicate.is_stale_on_disk() {
                Ok(false) => {}
                Ok(true) => return Err(DeleteError::Modified(duplicate.path.clone())),
                Err(e) => return Err(DeleteError::from_io(&duplicate.path, e)),
            }
            if fs::symlink_metadata(&original.path).is_err() {
                return Err(DeleteError::OriginalMissing(original.path.clone()));
            }
        }

        match self.config.method {
            DeleteMethod::Permanent => permanent_delete(&duplicate.path)?,
            DeleteMethod::Trash => delete_to_trash(&duplicate.path)?,
        }

        if let Err(e) = self.index.remove(&duplicate.path) {
            log::warn!(
                "Deleted {} but could not drop its index entry: {}",
                duplicate.path.display(),
                e
            );
            return Ok(false);
        }
        Ok(true)
    }
}

/// Move a single file to the system trash.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata cannot be read
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<(), DeleteError> {
    fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;

    trash::delete(path).map_err(|e| {
        log::error!("Trash operation failed for {}: {}", path.display(), e);
        DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {}", path.display());
    Ok(())
}

/// Permanently delete a single file.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if its metadata cannot be read
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<(), DeleteError> {
    fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        DeleteError::PermanentDeleteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Permanently deleted: {}", path.display());
    Ok(())
}
