use dupedb::duplicates::{GroupResolver, PreferenceOrder};
use dupedb::index::FileIndex;
use dupedb::maintenance::{prune_missing, rescan, RescanTarget};
use dupedb::scanner::{ScanConfig, ScanPipeline};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn setup(files: &[(&str, &[u8])]) -> (TempDir, PathBuf, Arc<FileIndex>) {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }
    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    ScanPipeline::new(Arc::clone(&index), ScanConfig::default())
        .scan(&root)
        .unwrap();
    (dir, root, index)
}

#[test]
fn test_after_prune_every_entry_exists() {
    let (_dir, root, index) = setup(&[
        ("a", b"1"),
        ("b/c", b"2"),
        ("b/d", b"3"),
        ("e/f/g", b"4"),
    ]);
    fs::remove_file(root.join("b/c")).unwrap();
    fs::remove_dir_all(root.join("e")).unwrap();

    let outcome = prune_missing(&index, None).unwrap();

    assert_eq!(outcome.examined, 4);
    assert_eq!(outcome.removed, 2);
    for entry in index.all_entries() {
        assert!(entry.unwrap().path.exists());
    }
}

#[test]
fn test_prune_is_idempotent() {
    let (_dir, root, index) = setup(&[("a", b"1"), ("b", b"2")]);
    fs::remove_file(root.join("a")).unwrap();

    assert_eq!(prune_missing(&index, None).unwrap().removed, 1);
    let second = prune_missing(&index, None).unwrap();
    assert_eq!(second.examined, 1);
    assert_eq!(second.removed, 0);
}

#[test]
fn test_rescan_splits_group_after_content_change() {
    let (_dir, root, index) = setup(&[("x/f", b"same"), ("y/f", b"same")]);
    assert_eq!(index.stats().unwrap().duplicate_groups, 1);

    fs::write(root.join("y/f"), b"SAME").unwrap();
    let outcome = rescan(&index, &RescanTarget::Duplicates, ScanConfig::default()).unwrap();

    assert_eq!(outcome.scanned, 2);
    let groups = GroupResolver::new(&index)
        .resolve_all(&PreferenceOrder::empty(), None)
        .unwrap();
    assert!(groups.is_empty());
}

#[test]
fn test_rescan_ignores_unchanged_mtime_shortcut() {
    let (_dir, root, index) = setup(&[("f", b"aaaa")]);
    let path = root.join("f");
    let before = fs::metadata(&path).unwrap().modified().unwrap();

    fs::write(&path, b"bbbb").unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(before)).unwrap();

    // A skip-existing scan trusts size + mtime and keeps the old fingerprint.
    ScanPipeline::new(
        Arc::clone(&index),
        ScanConfig::default().with_skip_existing(true),
    )
    .scan(&root)
    .unwrap();
    assert_eq!(
        index.get(&path).unwrap().unwrap().fingerprint,
        Some(*blake3::hash(b"aaaa").as_bytes())
    );

    rescan(
        &index,
        &RescanTarget::Paths(vec![path.clone()]),
        ScanConfig::default(),
    )
    .unwrap();
    assert_eq!(
        index.get(&path).unwrap().unwrap().fingerprint,
        Some(*blake3::hash(b"bbbb").as_bytes())
    );
}

#[test]
fn test_rescan_adds_unindexed_path() {
    let (_dir, root, index) = setup(&[("a", b"1")]);
    let extra = root.join("late.txt");
    fs::write(&extra, b"late").unwrap();

    let outcome = rescan(
        &index,
        &RescanTarget::Paths(vec![extra.clone()]),
        ScanConfig::default(),
    )
    .unwrap();

    assert_eq!(outcome.scanned, 1);
    assert!(index.get(&extra).unwrap().is_some());
}
