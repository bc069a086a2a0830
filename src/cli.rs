//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Catalog two trees, skipping files whose size and mtime are unchanged
//! dupedb scan /data/main --skip-existing
//! dupedb scan /data/backup --skip-existing
//!
//! # Show duplicates, keeping copies under /data/main
//! dupedb list --prefer /data/main
//!
//! # Dry run, then delete for real with a log
//! dupedb delete --prefer /data/main --simulate
//! dupedb delete --prefer /data/main --log deleted.csv
//!
//! # Housekeeping
//! dupedb prune
//! dupedb rescan --duplicates
//!
//! # Save the current settings as the config file
//! dupedb --db /data/index.db config --init
//! ```

use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Persistent duplicate file catalog.
///
/// dupedb fingerprints files into an on-disk index, groups identical content,
/// and picks one original per group from a directory preference order.
#[derive(Debug, Parser)]
#[command(name = "dupedb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Index database file (overrides the configured location)
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk a directory and fingerprint its files into the index
    Scan(ScanArgs),
    /// List duplicate groups with their chosen original
    List(ListArgs),
    /// Delete duplicates, keeping each group's original
    Delete(DeleteArgs),
    /// Drop index entries whose files no longer exist
    Prune,
    /// Re-fingerprint indexed files regardless of size and mtime
    Rescan(RescanArgs),
    /// Show index statistics
    Stats(StatsArgs),
    /// Print the effective configuration, or write it to the config file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    /// Reuse fingerprints of files whose size and mtime are unchanged
    #[arg(short, long)]
    pub skip_existing: bool,

    /// Number of fingerprinting workers (default: CPU count)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Follow symbolic links during the walk
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Minimum file size to index (e.g., 1KB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to index (e.g., 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Empty the index before scanning
    #[arg(long)]
    pub clear: bool,
}

/// Options shared by `list` and `delete`.
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// Preferred directory, highest priority first (repeatable)
    #[arg(short, long = "prefer", value_name = "DIR")]
    pub prefer: Vec<PathBuf>,

    /// Only consider files under this directory
    #[arg(long, value_name = "DIR")]
    pub within: Option<PathBuf>,

    /// Never treat files in preferred directories as duplicates
    #[arg(long)]
    pub protect_preferred: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: ListFormat,

    /// Write the listing to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub resolve: ResolveArgs,

    /// Report what would be deleted without touching anything
    #[arg(long)]
    pub simulate: bool,

    /// Record every attempted deletion in a CSV log
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Append to an existing log (default)
    #[arg(long, requires = "log", conflicts_with = "overwrite")]
    pub append: bool,

    /// Replace an existing log
    #[arg(long, requires = "log")]
    pub overwrite: bool,

    /// Move files to the system trash instead of deleting them
    #[arg(long)]
    pub trash: bool,

    /// Skip the size/mtime check against the index before deleting
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Debug, Args)]
pub struct RescanArgs {
    /// Files or directories to re-fingerprint (default: every fingerprinted entry)
    #[arg(value_name = "PATH", conflicts_with = "duplicates")]
    pub paths: Vec<PathBuf>,

    /// Only re-fingerprint members of duplicate groups
    #[arg(long)]
    pub duplicates: bool,

    /// Number of fingerprinting workers (default: CPU count)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the effective configuration to the config file
    #[arg(long)]
    pub init: bool,

    /// Replace an existing config file
    #[arg(long, requires = "init")]
    pub force: bool,
}

/// Format for `dupedb list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Grouped, human-readable listing
    Text,
    /// One row per file
    Csv,
    /// Groups plus a summary object
    Json,
}

/// Parse a human-readable size such as `512`, `10KB` or `1.5GiB`.
///
/// Decimal suffixes are powers of 1000, binary (`KiB`, `MiB`...) powers of 1024.
///
/// ```
/// use dupedb::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns a message naming the rejected input.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("size cannot be empty".to_string());
    }
    s.parse::<ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("invalid size '{s}': {e}"))
}
