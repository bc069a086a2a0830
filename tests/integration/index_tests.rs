use dupedb::index::{FileIndex, IndexEntry, IndexError};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn entry(path: &str, size: u64, byte: u8) -> IndexEntry {
    IndexEntry::new(
        PathBuf::from(path),
        size,
        [byte; 32],
        SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789),
    )
}

#[test]
fn test_index_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("state").join("index.db");

    {
        let index = FileIndex::open(&db).unwrap();
        index
            .upsert_batch(&[entry("/a", 10, 1), entry("/b", 10, 1), entry("/c", 3, 2)])
            .unwrap();
    }

    let index = FileIndex::open(&db).unwrap();
    assert_eq!(index.location(), Some(db.as_path()));
    assert_eq!(index.len().unwrap(), 3);
    let a = index.get(&PathBuf::from("/a")).unwrap().unwrap();
    assert_eq!(a.modified, entry("/a", 10, 1).modified);
    let stats = index.stats().unwrap();
    assert_eq!(stats.duplicate_groups, 1);
    assert_eq!(stats.duplicate_files, 2);
    assert_eq!(stats.reclaimable_bytes, 10);
}

#[test]
fn test_corrupt_index_is_reported_before_work() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");
    fs::write(&db, b"definitely not sqlite\n".repeat(300)).unwrap();

    match FileIndex::open(&db) {
        Err(IndexError::Corrupt { path, .. }) => assert_eq!(path, db),
        Err(other) => panic!("expected Corrupt, got {other}"),
        Ok(_) => panic!("expected Corrupt, got an open index"),
    }
    assert_eq!(fs::read(&db).unwrap().len(), 22 * 300);
}

#[test]
fn test_upsert_replaces_previous_state() {
    let index = FileIndex::open_in_memory().unwrap();
    index.upsert_batch(&[entry("/a", 10, 1)]).unwrap();
    index.upsert_batch(&[entry("/a", 20, 9)]).unwrap();

    let a = index.get(&PathBuf::from("/a")).unwrap().unwrap();
    assert_eq!(a.size, 20);
    assert_eq!(a.fingerprint, Some([9; 32]));
    assert_eq!(index.len().unwrap(), 1);
}

#[test]
fn test_groups_come_back_sorted_by_path() {
    let index = FileIndex::open_in_memory().unwrap();
    index
        .upsert_batch(&[entry("/z", 1, 5), entry("/m", 1, 5), entry("/a", 1, 5)])
        .unwrap();

    let group = index.groups_by_fingerprint(None).unwrap().next().unwrap().unwrap();
    let paths: Vec<_> = group.files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("/a"), PathBuf::from("/m"), PathBuf::from("/z")]
    );
}
