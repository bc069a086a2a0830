//! Index maintenance: pruning vanished files and forced re-fingerprinting.
//!
//! # Overview
//!
//! - [`prune_missing`] drops every entry whose path no longer exists.
//! - [`rescan`] fingerprints a chosen set of indexed files again, ignoring
//!   the size/mtime shortcut a normal scan takes.
//!
//! Both operate on the index alone; neither walks a directory tree.
//!
//! # Example
//!
//! ```no_run
//! use dupedb::index::FileIndex;
//! use dupedb::maintenance::{prune_missing, rescan, RescanTarget};
//! use dupedb::scanner::ScanConfig;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = Arc::new(FileIndex::open(Path::new("index.db")).unwrap());
//! let pruned = prune_missing(&index, None).unwrap();
//! println!("removed {} of {} entries", pruned.removed, pruned.examined);
//!
//! let outcome = rescan(&index, &RescanTarget::Duplicates, ScanConfig::default()).unwrap();
//! println!("{} re-fingerprinted", outcome.scanned);
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::index::{FileIndex, IndexError};
use crate::scanner::path_utils::{absolute_path, is_within};
use crate::scanner::{FileEntry, ScanConfig, ScanError, ScanOutcome, ScanPipeline};

/// Errors that abort a maintenance pass.
#[derive(thiserror::Error, Debug)]
pub enum MaintenanceError {
    /// Reading or writing the index failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The fingerprinting pool could not run.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Summary of a prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Entries looked at
    pub examined: usize,
    /// Entries removed because their file is gone
    pub removed: usize,
    /// Paths that were removed
    pub removed_paths: Vec<PathBuf>,
    /// Whether shutdown stopped the pass early
    pub interrupted: bool,
}

/// Which entries a rescan re-fingerprints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RescanTarget {
    /// Every entry that already has a fingerprint.
    #[default]
    AllFingerprinted,
    /// Only entries that belong to a duplicate group.
    Duplicates,
    /// The given files; a directory selects every indexed file under it.
    Paths(Vec<PathBuf>),
}

/// Remove every entry whose path no longer exists.
///
/// Entries whose existence cannot be determined (for example, permission
/// denied on a parent directory) are kept.
///
/// # Errors
///
/// Returns an error if the index cannot be read or written.
pub fn prune_missing(
    index: &FileIndex,
    shutdown_flag: Option<&AtomicBool>,
) -> Result<PruneOutcome, MaintenanceError> {
    let mut outcome = PruneOutcome::default();
    let mut missing = Vec::new();

    for entry in index.all_entries() {
        if shutdown_flag.is_some_and(|f| f.load(Ordering::SeqCst)) {
            outcome.interrupted = true;
            break;
        }
        let entry = entry?;
        outcome.examined += 1;
        match fs::symlink_metadata(&entry.path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Missing: {}", entry.path.display());
                missing.push(entry.path);
            }
            Err(e) => {
                log::warn!("Cannot check {}, keeping entry: {}", entry.path.display(), e);
            }
        }
    }

    for path in missing {
        if index.remove(&path)? {
            outcome.removed += 1;
            outcome.removed_paths.push(path);
        }
    }

    log::info!(
        "Pruned {} of {} entries{}",
        outcome.removed,
        outcome.examined,
        if outcome.interrupted { " (interrupted)" } else { "" }
    );
    Ok(outcome)
}

/// Re-fingerprint the entries selected by `target`.
///
/// A target whose file has vanished counts as failed and its entry is left
/// in place (use [`prune_missing`] to drop it). Paths that are not in the
/// index are fingerprinted and added.
///
/// # Errors
///
/// Returns an error if the index cannot be read or the pool cannot start.
pub fn rescan(
    index: &Arc<FileIndex>,
    target: &RescanTarget,
    config: ScanConfig,
) -> Result<ScanOutcome, MaintenanceError> {
    let files = select_targets(index, target)?;
    log::info!("Re-fingerprinting {} file(s)", files.len());

    let pipeline = ScanPipeline::new(Arc::clone(index), config);
    let outcome = pipeline.refingerprint(files)?;

    log::info!(
        "Rescan complete: {} fingerprinted, {} failed{}",
        outcome.scanned,
        outcome.failed,
        if outcome.interrupted { " (interrupted)" } else { "" }
    );
    Ok(outcome)
}

fn select_targets(index: &FileIndex, target: &RescanTarget) -> Result<Vec<FileEntry>, IndexError> {
    let paths: BTreeSet<PathBuf> = match target {
        RescanTarget::AllFingerprinted => index
            .all_entries()
            .filter_map(|entry| match entry {
                Ok(e) if e.fingerprint.is_some() => Some(Ok(e.path)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .collect::<Result<_, _>>()?,
        RescanTarget::Duplicates => {
            let mut paths = BTreeSet::new();
            for group in index.groups_by_fingerprint(None)? {
                paths.extend(group?.paths());
            }
            paths
        }
        RescanTarget::Paths(requested) => {
            let mut paths = BTreeSet::new();
            for path in requested {
                let path = absolute_path(path);
                if path.is_dir() {
                    for entry in index.all_entries() {
                        let entry = entry?;
                        if is_within(&entry.path, &path) {
                            paths.insert(entry.path);
                        }
                    }
                } else {
                    paths.insert(path);
                }
            }
            paths
        }
    };

    Ok(paths
        .into_iter()
        .map(|path| FileEntry::new(path, 0, std::time::UNIX_EPOCH))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Hasher;
    use std::path::Path;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn add(index: &FileIndex, path: &Path) {
        let meta = fs::metadata(path).unwrap();
        let hash = Hasher::new().full_hash(path).unwrap();
        index
            .upsert(path, meta.len(), Some(hash), meta.modified().unwrap())
            .unwrap();
    }

    #[test]
    fn test_prune_removes_only_missing() {
        let dir = TempDir::new().unwrap();
        let keep = dir.path().join("keep.txt");
        let gone = dir.path().join("gone.txt");
        fs::write(&keep, b"k").unwrap();
        fs::write(&gone, b"g").unwrap();

        let index = FileIndex::open_in_memory().unwrap();
        add(&index, &keep);
        add(&index, &gone);
        fs::remove_file(&gone).unwrap();

        let outcome = prune_missing(&index, None).unwrap();
        assert_eq!(outcome.examined, 2);
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.removed_paths, vec![gone.clone()]);
        assert!(index.get(&gone).unwrap().is_none());
        assert!(index.get(&keep).unwrap().is_some());

        for entry in index.all_entries() {
            assert!(entry.unwrap().path.exists());
        }
    }

    #[test]
    fn test_prune_empty_index() {
        let index = FileIndex::open_in_memory().unwrap();
        assert_eq!(prune_missing(&index, None).unwrap(), PruneOutcome::default());
    }

    #[test]
    fn test_prune_respects_shutdown() {
        let index = FileIndex::open_in_memory().unwrap();
        index
            .upsert(Path::new("/nope/a"), 1, Some([1u8; 32]), SystemTime::UNIX_EPOCH)
            .unwrap();
        let flag = AtomicBool::new(true);

        let outcome = prune_missing(&index, Some(&flag)).unwrap();
        assert!(outcome.interrupted);
        assert_eq!(outcome.removed, 0);
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn test_rescan_updates_changed_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, b"before").unwrap();

        let index = Arc::new(FileIndex::open_in_memory().unwrap());
        add(&index, &a);
        let before = index.get(&a).unwrap().unwrap().fingerprint;

        fs::write(&a, b"after!").unwrap();
        let outcome = rescan(&index, &RescanTarget::default(), ScanConfig::default()).unwrap();

        assert_eq!(outcome.scanned, 1);
        assert_eq!(outcome.bytes_hashed, 6);
        let after = index.get(&a).unwrap().unwrap().fingerprint;
        assert_ne!(before, after);
        assert_eq!(after, Some(*blake3::hash(b"after!").as_bytes()));
    }

    #[test]
    fn test_rescan_duplicates_only() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        fs::write(&a, b"dup").unwrap();
        fs::write(&b, b"dup").unwrap();
        fs::write(&c, b"unique").unwrap();

        let index = Arc::new(FileIndex::open_in_memory().unwrap());
        for p in [&a, &b, &c] {
            add(&index, p);
        }

        let outcome = rescan(&index, &RescanTarget::Duplicates, ScanConfig::default()).unwrap();
        assert_eq!(outcome.walked, 2);
        assert_eq!(outcome.scanned, 2);
    }

    #[test]
    fn test_rescan_missing_path_fails_and_keeps_entry() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, b"x").unwrap();

        let index = Arc::new(FileIndex::open_in_memory().unwrap());
        add(&index, &a);
        fs::remove_file(&a).unwrap();

        let outcome = rescan(
            &index,
            &RescanTarget::Paths(vec![a.clone()]),
            ScanConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.failed, 1);
        assert!(index.get(&a).unwrap().is_some());
    }

    #[test]
    fn test_rescan_directory_target() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        let inside = sub.join("in.txt");
        let outside = root.join("out.txt");
        fs::write(&inside, b"i").unwrap();
        fs::write(&outside, b"o").unwrap();

        let index = Arc::new(FileIndex::open_in_memory().unwrap());
        add(&index, &inside);
        add(&index, &outside);

        let outcome = rescan(
            &index,
            &RescanTarget::Paths(vec![sub]),
            ScanConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome.walked, 1);
        assert_eq!(outcome.scanned, 1);
    }
}
