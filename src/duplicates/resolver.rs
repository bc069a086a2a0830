//! Original selection for duplicate groups.
//!
//! # Overview
//!
//! Every duplicate group is split into exactly one **original** (the copy to
//! keep) and the remaining **duplicates**:
//!
//! 1. Members are bucketed by the first [`PreferenceOrder`] prefix they fall
//!    under; members under no prefix share the lowest-priority bucket.
//! 2. The original is taken from the best non-empty bucket: smallest
//!    directory depth first, then smallest path.
//! 3. Everything else is a duplicate, in ascending path order.
//!
//! The steps are the pure functions [`bucket_of`], [`compare_originals`] and
//! [`partition_group`]; [`GroupResolver`] only feeds them groups from the
//! index. The result depends on nothing but the index contents and the
//! preference order.
//!
//! # Example
//!
//! ```
//! use dupedb::duplicates::{partition_group, DuplicateGroup, PreferenceOrder, ResolveOptions};
//! use dupedb::index::IndexEntry;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let now = SystemTime::now();
//! let group = DuplicateGroup::new(
//!     [1u8; 32],
//!     vec![
//!         IndexEntry::new(PathBuf::from("/main/a.txt"), 3, [1u8; 32], now),
//!         IndexEntry::new(PathBuf::from("/other/b.txt"), 3, [1u8; 32], now),
//!     ],
//! );
//! let prefs = PreferenceOrder::new(vec![PathBuf::from("/other")]).unwrap();
//!
//! let resolved = partition_group(group, &prefs, ResolveOptions::default()).unwrap();
//! assert_eq!(resolved.original.path, PathBuf::from("/other/b.txt"));
//! assert_eq!(resolved.duplicates.len(), 1);
//! ```

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::DuplicateGroup;
use crate::error::ArgumentError;
use crate::index::{FileIndex, GroupIter, IndexEntry, IndexResult};
use crate::scanner::path_utils::{is_within, path_key};
use crate::scanner::Hash;

/// Ordered directory prefixes; earlier entries are preferred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceOrder {
    dirs: Vec<PathBuf>,
}

impl PreferenceOrder {
    /// Build a preference order from absolute directory paths.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::RelativePreference`] for a relative path and
    /// [`ArgumentError::DuplicatePreference`] if a directory appears twice.
    pub fn new(dirs: Vec<PathBuf>) -> Result<Self, ArgumentError> {
        let mut seen = HashSet::new();
        for dir in &dirs {
            if !dir.has_root() {
                return Err(ArgumentError::RelativePreference(dir.clone()));
            }
            let key = PathBuf::from(path_key(dir));
            if !seen.insert(key) {
                return Err(ArgumentError::DuplicatePreference(dir.clone()));
            }
        }
        Ok(Self { dirs })
    }

    /// Build a preference order from user input, resolving each directory
    /// to the canonical form the index stores.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::NotADirectory`] for a path that is missing or
    /// not a directory, otherwise the same as [`PreferenceOrder::new`].
    pub fn from_user_dirs(dirs: &[PathBuf]) -> Result<Self, ArgumentError> {
        let dirs = dirs
            .iter()
            .map(|d| existing_dir(d))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(dirs)
    }

    /// An empty order: every member lands in one bucket.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The prefixes, most preferred first.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Number of prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Whether no prefixes were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Whether `path` falls under any prefix.
    #[must_use]
    pub fn is_preferred(&self, path: &Path) -> bool {
        bucket_of(path, self) < self.dirs.len()
    }
}

/// Resolve a directory given on the command line to its canonical path.
///
/// # Errors
///
/// Returns [`ArgumentError::NotADirectory`] if `path` does not exist or is not
/// a directory.
pub fn existing_dir(path: &Path) -> Result<PathBuf, ArgumentError> {
    match path.canonicalize() {
        Ok(dir) if dir.is_dir() => Ok(dir),
        _ => Err(ArgumentError::NotADirectory(path.to_path_buf())),
    }
}

/// Options that refine the core partition rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Keep copies under any preferred prefix out of the duplicates list.
    pub protect_preferred: bool,
}

impl ResolveOptions {
    /// Set whether preferred copies are protected.
    #[must_use]
    pub fn with_protect_preferred(mut self, protect: bool) -> Self {
        self.protect_preferred = protect;
        self
    }
}

/// A duplicate group split into the copy to keep and the copies to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGroup {
    /// Shared fingerprint
    #[serde(serialize_with = "serialize_hash")]
    pub fingerprint: Hash,
    /// Size of each copy in bytes
    pub size: u64,
    /// The copy to keep
    pub original: IndexEntry,
    /// Copies to remove, ascending by path
    pub duplicates: Vec<IndexEntry>,
    /// Copies kept because they sit in a preferred directory
    /// (only with [`ResolveOptions::protect_preferred`])
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protected: Vec<IndexEntry>,
}

impl ResolvedGroup {
    /// Fingerprint as hexadecimal string.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        crate::scanner::hash_to_hex(&self.fingerprint)
    }

    /// Bytes freed by removing every duplicate.
    #[must_use]
    pub fn reclaimable(&self) -> u64 {
        self.duplicates.iter().map(|d| d.size).sum()
    }

    /// Total member count.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.duplicates.len() + self.protected.len()
    }

    /// A resolved group always has its original.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn serialize_hash<S: serde::Serializer>(hash: &Hash, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&crate::scanner::hash_to_hex(hash))
}

/// Index of the first preference prefix containing `path`, or
/// `prefs.len()` when none does.
#[must_use]
pub fn bucket_of(path: &Path, prefs: &PreferenceOrder) -> usize {
    prefs
        .dirs
        .iter()
        .position(|dir| is_within(path, dir))
        .unwrap_or(prefs.dirs.len())
}

/// Path ordering used throughout resolution (byte order of the stored path).
#[must_use]
pub fn compare_paths(a: &Path, b: &Path) -> Ordering {
    a.as_os_str().cmp(b.as_os_str())
}

/// Ordering among original candidates: shallower first, then smaller path.
#[must_use]
pub fn compare_originals(a: &IndexEntry, b: &IndexEntry) -> Ordering {
    a.directory_depth()
        .cmp(&b.directory_depth())
        .then_with(|| compare_paths(&a.path, &b.path))
}

/// Split one group into its original and duplicates.
///
/// Returns `None` for an empty group.
#[must_use]
pub fn partition_group(
    group: DuplicateGroup,
    prefs: &PreferenceOrder,
    options: ResolveOptions,
) -> Option<ResolvedGroup> {
    let best_bucket = group
        .files
        .iter()
        .map(|f| bucket_of(&f.path, prefs))
        .min()?;

    let original_idx = group
        .files
        .iter()
        .enumerate()
        .filter(|(_, f)| bucket_of(&f.path, prefs) == best_bucket)
        .min_by(|(_, a), (_, b)| compare_originals(a, b))
        .map(|(i, _)| i)?;

    let mut files = group.files;
    let original = files.swap_remove(original_idx);
    files.sort_by(|a, b| compare_paths(&a.path, &b.path));

    let (protected, duplicates) = if options.protect_preferred {
        files.into_iter().partition(|f| prefs.is_preferred(&f.path))
    } else {
        (Vec::new(), files)
    };

    Some(ResolvedGroup {
        fingerprint: group.hash,
        size: original.size,
        original,
        duplicates,
        protected,
    })
}

/// Resolves duplicate groups read from a [`FileIndex`].
#[derive(Debug)]
pub struct GroupResolver<'a> {
    index: &'a FileIndex,
    options: ResolveOptions,
}

impl<'a> GroupResolver<'a> {
    /// Create a resolver over `index`.
    #[must_use]
    pub fn new(index: &'a FileIndex) -> Self {
        Self {
            index,
            options: ResolveOptions::default(),
        }
    }

    /// Set resolution options.
    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Lazily resolve every duplicate group, optionally restricted to the
    /// subtree `within`.
    ///
    /// # Errors
    ///
    /// Returns an error if `within` cannot be used as an index prefix; each
    /// yielded item carries any error from reading the index.
    pub fn resolve<'p>(
        &self,
        prefs: &'p PreferenceOrder,
        within: Option<&Path>,
    ) -> IndexResult<ResolvedIter<'p>>
    where
        'a: 'p,
    {
        let groups = self.index.groups_by_fingerprint(within)?;
        log::debug!(
            "Resolving groups with {} preferred dir(s), within {:?}",
            prefs.len(),
            within
        );
        Ok(ResolvedIter {
            groups,
            prefs,
            options: self.options,
        })
    }

    /// Resolve everything into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first index error encountered.
    pub fn resolve_all(
        &self,
        prefs: &PreferenceOrder,
        within: Option<&Path>,
    ) -> IndexResult<Vec<ResolvedGroup>> {
        let resolved: Vec<ResolvedGroup> = self.resolve(prefs, within)?.collect::<Result<_, _>>()?;
        log::info!("Resolved {} duplicate group(s)", resolved.len());
        Ok(resolved)
    }
}

/// Lazy iterator returned by [`GroupResolver::resolve`].
pub struct ResolvedIter<'a> {
    groups: GroupIter<'a>,
    prefs: &'a PreferenceOrder,
    options: ResolveOptions,
}

impl Iterator for ResolvedIter<'_> {
    type Item = IndexResult<ResolvedGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.groups.next()? {
                Ok(group) => {
                    if let Some(resolved) = partition_group(group, self.prefs, self.options) {
                        return Some(Ok(resolved));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
