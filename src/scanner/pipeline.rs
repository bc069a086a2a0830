//! Scan pipeline: walk a tree and bring its index entries up to date.
//!
//! # Overview
//!
//! [`ScanPipeline::scan`] runs two phases:
//!
//! 1. **walking** - enumerate regular files under the root with [`Walker`];
//! 2. **fingerprinting** - on a bounded rayon pool of `workers` threads,
//!    fingerprint every file whose index entry is missing or stale (or every
//!    file, without `skip_existing`) and upsert the result.
//!
//! A file that cannot be read is counted as failed and leaves the index
//! untouched; the scan carries on. Each upsert commits on its own, so an
//! interrupted scan keeps everything finished before the interruption.
//!
//! # Example
//!
//! ```no_run
//! use dupedb::index::FileIndex;
//! use dupedb::scanner::{ScanConfig, ScanPipeline};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = Arc::new(FileIndex::open(Path::new("index.db")).unwrap());
//! let pipeline = ScanPipeline::new(index, ScanConfig::default().with_skip_existing(true));
//! let outcome = pipeline.scan(Path::new("/data")).unwrap();
//! println!("{} fingerprinted, {} skipped, {} failed", outcome.scanned, outcome.skipped, outcome.failed);
//! ```

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use bytesize::ByteSize;
use rayon::prelude::*;

use super::hasher::{Fingerprinter, Hasher};
use super::path_utils::canonical_dir;
use super::{FileEntry, HashError, ScanError, Walker, WalkerConfig};
use crate::index::FileIndex;
use crate::progress::ProgressCallback;

/// Files larger than this are announced when they start hashing.
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Number of worker threads used when none is configured.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

/// Configuration for a scan.
#[derive(Clone)]
pub struct ScanConfig {
    /// Trust index entries whose size and mtime still match the file.
    pub skip_existing: bool,
    /// Size of the fingerprinting pool.
    pub workers: usize,
    /// Directory walking options.
    pub walker: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("skip_existing", &self.skip_existing)
            .field("workers", &self.workers)
            .field("walker", &self.walker)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_existing: false,
            workers: default_workers(),
            walker: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ScanConfig {
    /// Skip files whose index entry is still current.
    #[must_use]
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the directory walking options.
    #[must_use]
    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
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

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// What happened to one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Fingerprinted and written to the index; carries the size read.
    Fingerprinted(u64),
    /// Index entry still current; nothing read.
    Skipped,
    /// Not attempted because shutdown was requested.
    Cancelled,
    /// Could not be fingerprinted or stored.
    Failed(HashError),
}

/// Summary of a scan or rescan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Files enumerated (or targeted, for a rescan)
    pub walked: usize,
    /// Files fingerprinted and upserted
    pub scanned: usize,
    /// Files skipped as unchanged
    pub skipped: usize,
    /// Files that failed (walk errors included)
    pub failed: usize,
    /// Per-file fingerprinting errors
    pub errors: Vec<HashError>,
    /// Errors raised while walking
    pub walk_errors: Vec<ScanError>,
    /// Bytes fingerprinted
    pub bytes_hashed: u64,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

impl ScanOutcome {
    /// Whether every file succeeded or was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Fingerprinted(size) => {
                self.scanned += 1;
                self.bytes_hashed += size;
            }
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Cancelled => self.interrupted = true,
            FileOutcome::Failed(e) => {
                self.failed += 1;
                self.errors.push(e);
            }
        }
    }
}

/// Walks directories and keeps the index in step with their contents.
pub struct ScanPipeline {
    index: Arc<FileIndex>,
    fingerprinter: Arc<dyn Fingerprinter>,
    config: ScanConfig,
    processed: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("index", &self.index)
            .field("config", &self.config)
            .field("processed", &self.processed)
            .finish()
    }
}

impl ScanPipeline {
    /// Create a pipeline using the default BLAKE3 [`Hasher`].
    #[must_use]
    pub fn new(index: Arc<FileIndex>, config: ScanConfig) -> Self {
        let mut hasher = Hasher::new();
        if let Some(flag) = &config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        Self {
            index,
            fingerprinter: Arc::new(hasher),
            config,
            processed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the fingerprint function.
    #[must_use]
    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Shared counter of files processed in the current phase.
    ///
    /// Workers bump it with a relaxed increment, so other threads can poll it
    /// without slowing the scan down.
    #[must_use]
    pub fn progress_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.processed)
    }

    /// Files processed so far in the current phase.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `root` recursively.
    ///
    /// # Errors
    ///
    /// Fails only if `root` is not an accessible directory or the worker pool
    /// cannot be built. Per-file problems are reported in the outcome.
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome, ScanError> {
        let root = canonical_dir(root)?;
        log::info!("Scanning {}", root.display());

        let mut outcome = ScanOutcome::default();
        let files = self.walk(&root, &mut outcome);

        if self.config.is_shutdown_requested() {
            outcome.interrupted = true;
            return Ok(outcome);
        }

        let force = !self.config.skip_existing;
        self.fingerprint_files(files, force, &mut outcome)?;

        log::info!(
            "Scan of {} complete: {} fingerprinted, {} skipped, {} failed{}",
            root.display(),
            outcome.scanned,
            outcome.skipped,
            outcome.failed,
            if outcome.interrupted { " (interrupted)" } else { "" }
        );
        Ok(outcome)
    }

    /// Fingerprint the given files unconditionally.
    ///
    /// Used by rescans; `walked` is set to the number of targets.
    ///
    /// # Errors
    ///
    /// Fails only if the worker pool cannot be built.
    pub fn refingerprint(&self, files: Vec<FileEntry>) -> Result<ScanOutcome, ScanError> {
        let mut outcome = ScanOutcome {
            walked: files.len(),
            ..Default::default()
        };
        self.fingerprint_files(files, true, &mut outcome)?;
        Ok(outcome)
    }

    fn walk(&self, root: &Path, outcome: &mut ScanOutcome) -> Vec<FileEntry> {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("walking", 0);
        }

        let mut walker = Walker::new(root, self.config.walker.clone());
        if let Some(flag) = &self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut files = Vec::new();
        for result in walker.walk() {
            match result {
                Ok(file) => {
                    files.push(file);
                    if let Some(ref callback) = self.config.progress_callback {
                        if let Some(last) = files.last() {
                            callback.on_progress(files.len(), last.path.to_string_lossy().as_ref());
                        }
                    }
                }
                Err(e) => {
                    log::warn!("{}", e);
                    outcome.failed += 1;
                    outcome.walk_errors.push(e);
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("walking");
        }
        outcome.walked = files.len();
        log::debug!("Walked {} files under {}", files.len(), root.display());
        files
    }

    fn fingerprint_files(
        &self,
        files: Vec<FileEntry>,
        force: bool,
        outcome: &mut ScanOutcome,
    ) -> Result<(), ScanError> {
        self.processed.store(0, Ordering::Relaxed);
        if files.is_empty() {
            log::debug!("No files to fingerprint");
            return Ok(());
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("fingerprinting", files.len());
        }
        log::debug!(
            "Fingerprinting up to {} files on {} worker(s)",
            files.len(),
            self.config.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .thread_name(|i| format!("dupedb-hash-{i}"))
            .build()?;

        let results: Vec<FileOutcome> = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let result = self.process_file(&file, force);
                    let done = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(done, file.path.to_string_lossy().as_ref());
                        if let FileOutcome::Fingerprinted(size) = result {
                            callback.on_item_completed(size);
                        }
                    }
                    result
                })
                .collect()
        });

        for result in results {
            outcome.record(result);
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("fingerprinting");
        }
        Ok(())
    }

    /// Decide whether `file` needs work, then fingerprint and store it.
    fn process_file(&self, file: &FileEntry, force: bool) -> FileOutcome {
        if self.config.is_shutdown_requested() {
            return FileOutcome::Cancelled;
        }

        if !force {
            match self.index.get(&file.path) {
                Ok(Some(entry)) if entry.is_current_for(file) => {
                    log::trace!("Unchanged, skipping: {}", file.path.display());
                    return FileOutcome::Skipped;
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Index lookup failed for {}: {}", file.path.display(), e);
                }
            }
        }

        match self.fingerprint_and_store(&file.path) {
            Ok(size) => FileOutcome::Fingerprinted(size),
            Err(HashError::Interrupted(_)) => FileOutcome::Cancelled,
            Err(e) => {
                log::warn!("Failed to fingerprint {}: {}", file.path.display(), e);
                FileOutcome::Failed(e)
            }
        }
    }

    /// Fingerprint one file and upsert it.
    ///
    /// Size and mtime are read before hashing, so a file modified mid-hash
    /// is stale on the next scan rather than silently trusted.
    fn fingerprint_and_store(&self, path: &Path) -> Result<u64, HashError> {
        let metadata = fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(HashError::NotAFile(path.to_path_buf()));
        }
        let size = metadata.len();
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);

        if size > LARGE_FILE_THRESHOLD {
            log::debug!(
                "Hashing large file ({} MB): {}",
                size / (1024 * 1024),
                path.display()
            );
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_message(&format!("large file ({})", ByteSize::b(size)));
            }
        }

        let fingerprint = self.fingerprinter.fingerprint(path)?;
        self.index
            .upsert(path, size, Some(fingerprint), modified)
            .map_err(|e| HashError::Index {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        log::trace!("Fingerprinted {}", path.display());
        Ok(size)
    }
}
