//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! Content fingerprints are produced through the [`Fingerprinter`] trait so the
//! scan pipeline never depends on a specific algorithm. [`Hasher`] is the
//! default implementation: it streams small files through a fixed buffer and
//! memory-maps files above [`MMAP_THRESHOLD`].
//!
//! Empty files are hashed like any other file; every 0-byte file shares the
//! BLAKE3 hash of the empty input.
//!
//! # Example
//!
//! ```no_run
//! use dupedb::scanner::{Fingerprinter, Hasher, hash_to_hex};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.fingerprint(Path::new("file.bin")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// Fixed-width content fingerprint (32 bytes).
pub type Hash = [u8; 32];

/// Read buffer used for streaming hashes.
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Files at or above this size are hashed through a memory map.
pub const MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// A pure mapping from file content to a fixed-width fingerprint.
///
/// Implementations must be deterministic: hashing an unmodified file twice
/// yields the same value.
pub trait Fingerprinter: Send + Sync {
    /// Fingerprint the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn fingerprint(&self, path: &Path) -> Result<Hash, HashError>;
}

/// Default BLAKE3 fingerprinter.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort long reads when the shutdown flag is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read or the shutdown flag
    /// was raised mid-read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        let mut hasher = blake3::Hasher::new();
        if size >= MMAP_THRESHOLD {
            log::trace!("Hashing via mmap: {}", path.display());
            hasher
                .update_mmap(path)
                .map_err(|e| HashError::from_io(path, e))?;
        } else {
            self.stream_into(&mut hasher, file, path)?;
        }

        Ok(*hasher.finalize().as_bytes())
    }

    fn stream_into(
        &self,
        hasher: &mut blake3::Hasher,
        mut file: File,
        path: &Path,
    ) -> Result<(), HashError> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(())
    }
}

impl Fingerprinter for Hasher {
    fn fingerprint(&self, path: &Path) -> Result<Hash, HashError> {
        self.full_hash(path)
    }
}

/// Convert a hash to its lowercase hexadecimal form.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
