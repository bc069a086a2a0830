//! Duplicate groups and original selection.
//!
//! This module provides:
//! - [`DuplicateGroup`]: index entries sharing one fingerprint
//! - [`GroupResolver`]: splits each group into one original and its duplicates
//!   according to a [`PreferenceOrder`]

pub mod groups;
pub mod resolver;

pub use groups::DuplicateGroup;
pub use resolver::{
    bucket_of, compare_originals, compare_paths, existing_dir, partition_group, GroupResolver,
    PreferenceOrder, ResolveOptions, ResolvedGroup, ResolvedIter,
};
