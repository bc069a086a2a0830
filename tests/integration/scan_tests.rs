use dupedb::index::FileIndex;
use dupedb::scanner::{ScanConfig, ScanPipeline, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn canonical_tempdir() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn scan(index: &Arc<FileIndex>, root: &Path, config: ScanConfig) -> dupedb::scanner::ScanOutcome {
    ScanPipeline::new(Arc::clone(index), config).scan(root).unwrap()
}

#[test]
fn test_scan_empty_directory() {
    let (_dir, root) = canonical_tempdir();
    let index = Arc::new(FileIndex::open_in_memory().unwrap());

    let outcome = scan(&index, &root, ScanConfig::default());

    assert_eq!(outcome.walked, 0);
    assert_eq!(outcome.scanned, 0);
    assert!(index.is_empty().unwrap());
}

#[test]
fn test_scan_indexes_nested_files() {
    let (_dir, root) = canonical_tempdir();
    write(&root.join("a.txt"), b"same");
    write(&root.join("sub/b.txt"), b"same");
    write(&root.join("sub/deeper/c.txt"), b"different");
    let index = Arc::new(FileIndex::open_in_memory().unwrap());

    let outcome = scan(&index, &root, ScanConfig::default());

    assert_eq!(outcome.walked, 3);
    assert_eq!(outcome.scanned, 3);
    assert!(outcome.is_clean());
    let entry = index.get(&root.join("sub/deeper/c.txt")).unwrap().unwrap();
    assert_eq!(entry.size, 9);
    assert_eq!(entry.fingerprint, Some(*blake3::hash(b"different").as_bytes()));
    assert_eq!(index.groups_by_fingerprint(None).unwrap().count(), 1);
}

#[test]
fn test_second_scan_with_skip_existing_fingerprints_nothing() {
    let (_dir, root) = canonical_tempdir();
    for i in 0..5 {
        write(&root.join(format!("f{i}.bin")), format!("content {i}").as_bytes());
    }
    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let config = || ScanConfig::default().with_skip_existing(true);

    let first = scan(&index, &root, config());
    assert_eq!(first.scanned, 5);

    let second = scan(&index, &root, config());
    assert_eq!(second.walked, 5);
    assert_eq!(second.scanned, 0);
    assert_eq!(second.skipped, 5);
    assert_eq!(second.bytes_hashed, 0);
}

#[test]
fn test_fingerprints_are_deterministic_for_unmodified_files() {
    let (_dir, root) = canonical_tempdir();
    let path = root.join("stable.dat");
    write(&path, &vec![7u8; 100_000]);
    let index = Arc::new(FileIndex::open_in_memory().unwrap());

    scan(&index, &root, ScanConfig::default());
    let first = index.get(&path).unwrap().unwrap().fingerprint;
    scan(&index, &root, ScanConfig::default());
    let second = index.get(&path).unwrap().unwrap().fingerprint;

    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_empty_files_hash_and_group_together() {
    let (_dir, root) = canonical_tempdir();
    write(&root.join("empty1"), b"");
    write(&root.join("nested/empty2"), b"");
    let index = Arc::new(FileIndex::open_in_memory().unwrap());

    scan(&index, &root, ScanConfig::default());

    let groups: Vec<_> = index
        .groups_by_fingerprint(None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 0);
    assert_eq!(groups[0].files.len(), 2);
}

#[test]
fn test_scan_respects_walker_filters() {
    let (_dir, root) = canonical_tempdir();
    write(&root.join("keep.txt"), b"0123456789");
    write(&root.join("small.txt"), b"1");
    write(&root.join("skip.tmp"), b"0123456789");
    write(&root.join(".hidden/file.txt"), b"0123456789");
    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let walker = WalkerConfig::new(false, true, Some(5), None, vec!["*.tmp".to_string()]);

    let outcome = scan(&index, &root, ScanConfig::default().with_walker_config(walker));

    assert_eq!(outcome.walked, 1);
    assert!(index.get(&root.join("keep.txt")).unwrap().is_some());
    assert_eq!(index.len().unwrap(), 1);
}

#[test]
fn test_two_roots_share_one_index() {
    let (_dir, root) = canonical_tempdir();
    write(&root.join("main/photo.jpg"), b"pixels");
    write(&root.join("backup/photo.jpg"), b"pixels");
    let index = Arc::new(FileIndex::open_in_memory().unwrap());

    scan(&index, &root.join("main"), ScanConfig::default());
    scan(&index, &root.join("backup"), ScanConfig::default().with_skip_existing(true));

    assert_eq!(index.len().unwrap(), 2);
    assert_eq!(index.stats().unwrap().duplicate_groups, 1);
}

#[test]
fn test_single_worker_matches_parallel_result() {
    let (_dir, root) = canonical_tempdir();
    for i in 0..20 {
        write(&root.join(format!("d{}/f{i}", i % 3)), &[(i % 4) as u8; 64]);
    }
    let serial = Arc::new(FileIndex::open_in_memory().unwrap());
    let parallel = Arc::new(FileIndex::open_in_memory().unwrap());

    scan(&serial, &root, ScanConfig::default().with_workers(1));
    scan(&parallel, &root, ScanConfig::default().with_workers(8));

    let collect = |index: &FileIndex| {
        let mut entries: Vec<_> = index
            .all_entries()
            .map(|e| {
                let e = e.unwrap();
                (e.path, e.fingerprint)
            })
            .collect();
        entries.sort();
        entries
    };
    assert_eq!(collect(&serial), collect(&parallel));
}
