//! dupedb - persistent duplicate file catalog
//!
//! Files are fingerprinted into an on-disk index; files sharing a
//! fingerprint form duplicate groups, and each group is split into one
//! original and its removable copies by a directory preference order.
//!
//! - [`index`]: the SQLite-backed catalog
//! - [`scanner`]: walking and fingerprinting into the index
//! - [`duplicates`]: grouping and original selection
//! - [`actions`]: deleting resolved duplicates
//! - [`maintenance`]: pruning vanished files and forced re-fingerprinting

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod maintenance;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

pub use app::run_app;
