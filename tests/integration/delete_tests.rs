use dupedb::actions::{DeleteConfig, DeletionExecutor, DeletionOutcome};
use dupedb::duplicates::{GroupResolver, PreferenceOrder, ResolvedGroup};
use dupedb::index::FileIndex;
use dupedb::maintenance::prune_missing;
use dupedb::output::{DeletionLog, LogMode};
use dupedb::scanner::{ScanConfig, ScanPipeline};
use std::fs;
use std::path::{Path, PathBuf};
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

fn resolve(index: &FileIndex, prefs: &PreferenceOrder) -> Vec<ResolvedGroup> {
    GroupResolver::new(index).resolve_all(prefs, None).unwrap()
}

fn snapshot(index: &FileIndex) -> Vec<(PathBuf, u64)> {
    let mut entries: Vec<_> = index
        .all_entries()
        .map(|e| {
            let e = e.unwrap();
            (e.path, e.size)
        })
        .collect();
    entries.sort();
    entries
}

#[test]
fn test_simulation_is_side_effect_free_and_predicts_real_run() {
    let (_dir, root, index) = setup(&[
        ("keep/a", b"alpha"),
        ("copy/a", b"alpha"),
        ("copy/b", b"alpha"),
        ("keep/c", b"gamma"),
        ("copy/c", b"gamma"),
        ("unique", b"solo"),
    ]);
    let prefs = PreferenceOrder::new(vec![root.join("keep")]).unwrap();
    let groups = resolve(&index, &prefs);
    let before = snapshot(&index);

    let executor = DeletionExecutor::new(&index, DeleteConfig::default());
    let simulated = executor.execute(&groups, true);

    assert_eq!(snapshot(&index), before);
    assert!(root.join("copy/a").exists());
    assert!(root.join("copy/b").exists());
    assert!(root.join("copy/c").exists());
    assert_eq!(simulated.simulated_count(), 3);

    let real = executor.execute(&groups, false);
    let simulated_paths: Vec<&Path> = simulated.records.iter().map(|r| r.path.as_path()).collect();
    let deleted_paths: Vec<&Path> = real
        .records
        .iter()
        .filter(|r| r.outcome == DeletionOutcome::Deleted)
        .map(|r| r.path.as_path())
        .collect();
    assert_eq!(simulated_paths, deleted_paths);
    assert_eq!(real.bytes_freed(), 5 + 5 + 5);

    assert!(root.join("keep/a").exists());
    assert!(root.join("keep/c").exists());
    assert!(!root.join("copy/a").exists());
    assert_eq!(index.len().unwrap(), 3);
    assert!(resolve(&index, &prefs).is_empty());
}

#[test]
fn test_original_is_never_deleted() {
    let (_dir, root, index) = setup(&[("x/f", b"dup"), ("y/f", b"dup")]);
    let groups = resolve(&index, &PreferenceOrder::empty());

    let report = DeletionExecutor::new(&index, DeleteConfig::default()).execute(&groups, false);

    assert_eq!(report.deleted_count(), 1);
    assert!(root.join("x/f").exists());
    assert!(!root.join("y/f").exists());
}

#[test]
fn test_externally_deleted_duplicate_is_pruned_and_absent() {
    let (_dir, root, index) = setup(&[("a/f", b"dup"), ("b/f", b"dup"), ("c/f", b"dup")]);
    fs::remove_file(root.join("b/f")).unwrap();

    let outcome = prune_missing(&index, None).unwrap();
    assert_eq!(outcome.removed, 1);

    let groups = resolve(&index, &PreferenceOrder::empty());
    assert_eq!(groups.len(), 1);
    let members: Vec<&Path> = std::iter::once(groups[0].original.path.as_path())
        .chain(groups[0].duplicates.iter().map(|e| e.path.as_path()))
        .collect();
    assert!(!members.contains(&root.join("b/f").as_path()));
    assert_eq!(members.len(), 2);
}

#[test]
fn test_failed_deletion_does_not_stop_batch() {
    let (_dir, root, index) = setup(&[("a/1", b"one"), ("b/1", b"one"), ("a/2", b"two"), ("b/2", b"two")]);
    let groups = resolve(&index, &PreferenceOrder::empty());
    fs::remove_file(root.join("b/1")).unwrap();

    let report = DeletionExecutor::new(&index, DeleteConfig::default()).execute(&groups, false);

    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.deleted_count(), 1);
    assert!(!root.join("b/2").exists());
    let failed = report
        .records
        .iter()
        .find(|r| matches!(r.outcome, DeletionOutcome::Failed(_)))
        .unwrap();
    assert_eq!(failed.path, root.join("b/1"));
    assert!(index.get(&root.join("b/1")).unwrap().is_some());
}

#[test]
fn test_deletion_log_records_every_attempt() {
    let (dir, _root, index) = setup(&[("a/f", b"dup"), ("b/f", b"dup"), ("c/f", b"dup")]);
    let groups = resolve(&index, &PreferenceOrder::empty());
    let log_path = dir.path().join("deleted.csv");

    {
        let mut log = DeletionLog::open(&log_path, LogMode::Append).unwrap();
        DeletionExecutor::new(&index, DeleteConfig::default())
            .execute_with_sink(&groups, true, &mut log);
    }
    {
        let mut log = DeletionLog::open(&log_path, LogMode::Append).unwrap();
        DeletionExecutor::new(&index, DeleteConfig::default())
            .execute_with_sink(&groups, true, &mut log);
    }

    let content = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "path,outcome,reason,size,timestamp");
    assert_eq!(lines.len(), 1 + 2 + 2);
    assert!(lines[1..].iter().all(|l| l.contains(",simulated,")));

    {
        let mut log = DeletionLog::open(&log_path, LogMode::Overwrite).unwrap();
        DeletionExecutor::new(&index, DeleteConfig::default())
            .execute_with_sink(&groups, true, &mut log);
    }
    assert_eq!(fs::read_to_string(&log_path).unwrap().lines().count(), 3);
}
