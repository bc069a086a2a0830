//! Structured error handling and exit codes.

use serde::Serialize;
use std::path::PathBuf;

/// Exit codes for the dupedb application.
///
/// - 0: Success (completed normally; for `list`/`delete`, duplicates found)
/// - 1: General error (unexpected failure, corrupt index, bad arguments)
/// - 2: No duplicates found (completed normally, no duplicates)
/// - 3: Partial success (completed with some per-file failures)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: the index holds no duplicate groups in scope.
    NoDuplicates = 2,
    /// Partial success: some files failed to fingerprint or delete.
    PartialSuccess = 3,
    /// Interrupted: the command was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DD000",
            Self::GeneralError => "DD001",
            Self::NoDuplicates => "DD002",
            Self::PartialSuccess => "DD003",
            Self::Interrupted => "DD130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Invalid caller input, rejected before any work starts.
#[derive(thiserror::Error, Debug)]
pub enum ArgumentError {
    /// A directory argument does not exist or is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A preference prefix must be an absolute path.
    #[error("preferred directory must be absolute: {0}")]
    RelativePreference(PathBuf),

    /// The same directory appears twice in the preference order.
    #[error("directory listed twice in preference order: {0}")]
    DuplicatePreference(PathBuf),

    /// Worker count must be at least one.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// A size bound was given with min greater than max.
    #[error("minimum size {min} exceeds maximum size {max}")]
    SizeRange {
        /// Lower bound in bytes
        min: u64,
        /// Upper bound in bytes
        max: u64,
    },
}
