//! Path helpers shared by the scanner, the resolver and the index.
//!
//! # Unicode
//!
//! macOS stores file names in NFD while Linux and Windows usually use NFC, so
//! the same visual name can have different byte representations. Paths are
//! stored in the index exactly as the filesystem reports them (rewriting them
//! would break deletion on byte-exact filesystems); only *comparisons* such as
//! preference-prefix matching go through [`path_key`].
//!
//! # Example
//!
//! ```
//! use dupedb::scanner::path_utils::{is_within, directory_depth};
//! use std::path::Path;
//!
//! assert!(is_within(Path::new("/data/photos/a.jpg"), Path::new("/data")));
//! assert!(!is_within(Path::new("/database/a.jpg"), Path::new("/data")));
//! assert_eq!(directory_depth(Path::new("/data/photos/a.jpg")), 3);
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

use super::ScanError;

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Create a normalized comparison key for a path.
///
/// On Windows the key is also lowercased, since paths there compare
/// case-insensitively.
#[must_use]
pub fn path_key(path: &Path) -> String {
    let key = normalize_path_str(&path.to_string_lossy());
    if cfg!(windows) {
        key.to_lowercase()
    } else {
        key
    }
}

/// Check whether `path` lies inside (or is) the directory `prefix`.
///
/// Matching is component-wise, so `/data` is not a prefix of `/database`.
#[must_use]
pub fn is_within(path: &Path, prefix: &Path) -> bool {
    let path = PathBuf::from(path_key(path));
    let prefix = PathBuf::from(path_key(prefix));
    path.starts_with(prefix)
}

/// Number of normal components in `path`.
///
/// Root and prefix components are not counted, so `/a.txt` has depth 1 and
/// `/a/b/c.txt` has depth 3.
#[must_use]
pub fn directory_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Resolve a user-supplied directory to its canonical absolute form.
///
/// # Errors
///
/// Returns [`ScanError::NotFound`] if the path does not exist,
/// [`ScanError::NotADirectory`] if it is not a directory, and
/// [`ScanError::PermissionDenied`] or [`ScanError::Io`] if it cannot be resolved.
pub fn canonical_dir(path: &Path) -> Result<PathBuf, ScanError> {
    let canonical = path.canonicalize().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
        _ => ScanError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    if !canonical.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }
    Ok(canonical)
}

/// Resolve a file path to its canonical absolute form, falling back to an
/// absolute (but unresolved) path when the file no longer exists.
///
/// Used for paths that may already be gone from disk but still sit in the
/// index, such as explicit rescan targets.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
