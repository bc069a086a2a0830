use dupedb::duplicates::{GroupResolver, PreferenceOrder, ResolveOptions, ResolvedGroup};
use dupedb::error::ArgumentError;
use dupedb::index::FileIndex;
use dupedb::scanner::{ScanConfig, ScanPipeline};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    index: Arc<FileIndex>,
}

impl Fixture {
    fn new(files: &[(&str, &[u8])]) -> Self {
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
        Self {
            _dir: dir,
            root,
            index,
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn prefs(&self, rels: &[&str]) -> PreferenceOrder {
        PreferenceOrder::new(rels.iter().map(|r| self.path(r)).collect()).unwrap()
    }

    fn resolve(&self, prefs: &PreferenceOrder) -> Vec<ResolvedGroup> {
        GroupResolver::new(&self.index)
            .resolve_all(prefs, None)
            .unwrap()
    }
}

fn paths(group: &ResolvedGroup) -> Vec<&Path> {
    group.duplicates.iter().map(|e| e.path.as_path()).collect()
}

#[test]
fn test_preferred_directory_supplies_original() {
    let fx = Fixture::new(&[("main/a.txt", b"shared"), ("other/b.txt", b"shared")]);

    let groups = fx.resolve(&fx.prefs(&["main"]));

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].original.path, fx.path("main/a.txt"));
    assert_eq!(paths(&groups[0]), vec![fx.path("other/b.txt").as_path()]);
}

#[test]
fn test_shallowest_file_wins_without_preferences() {
    let fx = Fixture::new(&[
        ("x/one.txt", b"dup"),
        ("top.txt", b"dup"),
        ("x/y/three.txt", b"dup"),
    ]);

    let groups = fx.resolve(&PreferenceOrder::empty());

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].original.path, fx.path("top.txt"));
    assert_eq!(groups[0].duplicates.len(), 2);
}

#[test]
fn test_preference_beats_depth() {
    let fx = Fixture::new(&[
        ("archive/2020/01/deep.txt", b"dup"),
        ("shallow.txt", b"dup"),
    ]);

    let groups = fx.resolve(&fx.prefs(&["archive"]));

    assert_eq!(groups[0].original.path, fx.path("archive/2020/01/deep.txt"));
}

#[test]
fn test_earlier_preference_wins() {
    let fx = Fixture::new(&[("first/f.txt", b"dup"), ("second/f.txt", b"dup")]);

    let groups = fx.resolve(&fx.prefs(&["second", "first"]));

    assert_eq!(groups[0].original.path, fx.path("second/f.txt"));
}

#[test]
fn test_equal_depth_tie_breaks_on_path() {
    let fx = Fixture::new(&[("b/f.txt", b"dup"), ("a/f.txt", b"dup"), ("c/f.txt", b"dup")]);

    let groups = fx.resolve(&PreferenceOrder::empty());

    assert_eq!(groups[0].original.path, fx.path("a/f.txt"));
    assert_eq!(
        paths(&groups[0]),
        vec![fx.path("b/f.txt").as_path(), fx.path("c/f.txt").as_path()]
    );
}

#[test]
fn test_resolve_is_deterministic() {
    let fx = Fixture::new(&[
        ("m/1", b"a"),
        ("n/1", b"a"),
        ("o/p/1", b"a"),
        ("m/2", b"b"),
        ("n/q/2", b"b"),
        ("single", b"c"),
    ]);
    let prefs = fx.prefs(&["n"]);

    let first = fx.resolve(&prefs);
    let second = fx.resolve(&prefs);

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn test_partition_covers_every_member_once() {
    let fx = Fixture::new(&[("a/1", b"z"), ("b/1", b"z"), ("c/1", b"z"), ("d/e/1", b"z")]);

    let group = fx.resolve(&fx.prefs(&["c"])).remove(0);

    let mut all: Vec<PathBuf> = group.duplicates.iter().map(|e| e.path.clone()).collect();
    all.push(group.original.path.clone());
    all.sort();
    let mut expected: Vec<PathBuf> = ["a/1", "b/1", "c/1", "d/e/1"]
        .iter()
        .map(|r| fx.path(r))
        .collect();
    expected.sort();
    assert_eq!(all, expected);
    assert!(group.protected.is_empty());
}

#[test]
fn test_within_limits_groups() {
    let fx = Fixture::new(&[
        ("inside/a", b"one"),
        ("inside/b", b"one"),
        ("inside/c", b"two"),
        ("outside/c", b"two"),
    ]);

    let groups = GroupResolver::new(&fx.index)
        .resolve_all(&PreferenceOrder::empty(), Some(fx.path("inside").as_path()))
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].original.path, fx.path("inside/a"));
}

#[test]
fn test_within_does_not_match_sibling_prefix() {
    let fx = Fixture::new(&[("data/a", b"x"), ("database/a", b"x"), ("database/b", b"x")]);

    let groups = GroupResolver::new(&fx.index)
        .resolve_all(&PreferenceOrder::empty(), Some(fx.path("data").as_path()))
        .unwrap();

    assert!(groups.is_empty());
}

#[test]
fn test_protect_preferred_keeps_second_preferred_copy() {
    let fx = Fixture::new(&[
        ("main/a", b"dup"),
        ("main/sub/b", b"dup"),
        ("other/c", b"dup"),
    ]);
    let prefs = fx.prefs(&["main"]);

    let groups = GroupResolver::new(&fx.index)
        .with_options(ResolveOptions::default().with_protect_preferred(true))
        .resolve_all(&prefs, None)
        .unwrap();

    let group = &groups[0];
    assert_eq!(group.original.path, fx.path("main/a"));
    assert_eq!(paths(group), vec![fx.path("other/c").as_path()]);
    assert_eq!(group.protected.len(), 1);
    assert_eq!(group.protected[0].path, fx.path("main/sub/b"));
}

#[test]
fn test_reclaimable_counts_duplicates_only() {
    let fx = Fixture::new(&[("a", b"12345"), ("b", b"12345"), ("c", b"12345")]);

    let groups = fx.resolve(&PreferenceOrder::empty());

    assert_eq!(groups[0].size, 5);
    assert_eq!(groups[0].reclaimable(), 10);
}

#[test]
fn test_invalid_preference_lists_are_rejected() {
    assert!(matches!(
        PreferenceOrder::new(vec![PathBuf::from("relative/dir")]),
        Err(ArgumentError::RelativePreference(_))
    ));
    assert!(matches!(
        PreferenceOrder::new(vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/a")]),
        Err(ArgumentError::DuplicatePreference(_))
    ));
}
