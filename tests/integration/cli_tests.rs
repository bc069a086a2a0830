use clap::Parser;
use dupedb::cli::Cli;
use dupedb::error::ExitCode;
use dupedb::run_app;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Workspace {
    _dir: TempDir,
    root: PathBuf,
    db: PathBuf,
    config: PathBuf,
}

impl Workspace {
    fn new(files: &[(&str, &[u8])]) -> Self {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let root = base.join("tree");
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        fs::create_dir_all(&root).unwrap();
        Self {
            _dir: dir,
            db: base.join("index.db"),
            config: base.join("absent-config.toml"),
            root,
        }
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let mut argv: Vec<String> = vec![
            "dupedb".into(),
            "-q".into(),
            "--db".into(),
            self.db.display().to_string(),
            "--config".into(),
            self.config.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        run_app(Cli::try_parse_from(argv).unwrap())
    }

    fn path(&self, rel: &str) -> String {
        self.root.join(rel).display().to_string()
    }
}

#[test]
fn test_scan_list_delete_flow() {
    let ws = Workspace::new(&[("main/a.txt", b"shared"), ("other/b.txt", b"shared")]);
    let root = ws.root.display().to_string();
    let listing = ws.root.parent().unwrap().join("groups.json");

    assert_eq!(ws.run(&["scan", &root]).unwrap(), ExitCode::Success);
    assert_eq!(
        ws.run(&[
            "list",
            "--prefer",
            &ws.path("main"),
            "--format",
            "json",
            "-o",
            &listing.display().to_string(),
        ])
        .unwrap(),
        ExitCode::Success
    );

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&listing).unwrap()).unwrap();
    assert_eq!(json["duplicates"][0]["original"], ws.path("main/a.txt"));
    assert_eq!(json["duplicates"][0]["duplicates"][0], ws.path("other/b.txt"));
    assert_eq!(json["summary"]["duplicate_groups"], 1);

    assert_eq!(
        ws.run(&["delete", "--prefer", &ws.path("main"), "--simulate"]).unwrap(),
        ExitCode::Success
    );
    assert!(Path::new(&ws.path("other/b.txt")).exists());

    assert_eq!(
        ws.run(&["delete", "--prefer", &ws.path("main")]).unwrap(),
        ExitCode::Success
    );
    assert!(Path::new(&ws.path("main/a.txt")).exists());
    assert!(!Path::new(&ws.path("other/b.txt")).exists());

    assert_eq!(ws.run(&["list"]).unwrap(), ExitCode::NoDuplicates);
}

#[test]
fn test_list_without_duplicates_exits_two() {
    let ws = Workspace::new(&[("a", b"1"), ("b", b"2")]);
    let root = ws.root.display().to_string();
    ws.run(&["scan", &root]).unwrap();

    assert_eq!(ws.run(&["list"]).unwrap(), ExitCode::NoDuplicates);
    assert_eq!(ws.run(&["delete"]).unwrap(), ExitCode::NoDuplicates);
}

#[test]
fn test_csv_listing_columns() {
    let ws = Workspace::new(&[("x/f", b"dup"), ("y/f", b"dup")]);
    let root = ws.root.display().to_string();
    let out = ws.root.parent().unwrap().join("groups.csv");
    ws.run(&["scan", &root]).unwrap();

    ws.run(&["list", "--format", "csv", "-o", &out.display().to_string()])
        .unwrap();

    let content = fs::read_to_string(&out).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("group_id,hash,role,path,size,modified"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(",original,"));
    assert!(rows[1].contains(",duplicate,"));
}

#[test]
fn test_prune_rescan_and_stats_commands() {
    let ws = Workspace::new(&[("a", b"same"), ("b", b"same"), ("c", b"other")]);
    let root = ws.root.display().to_string();
    ws.run(&["scan", &root]).unwrap();
    fs::remove_file(ws.root.join("c")).unwrap();

    assert_eq!(ws.run(&["prune"]).unwrap(), ExitCode::Success);
    assert_eq!(ws.run(&["rescan", "--duplicates"]).unwrap(), ExitCode::Success);
    assert_eq!(ws.run(&["stats", "--json"]).unwrap(), ExitCode::Success);
}

#[test]
fn test_rescan_of_vanished_file_is_partial_success() {
    let ws = Workspace::new(&[("a", b"x")]);
    let root = ws.root.display().to_string();
    ws.run(&["scan", &root]).unwrap();
    fs::remove_file(ws.root.join("a")).unwrap();

    assert_eq!(ws.run(&["rescan"]).unwrap(), ExitCode::PartialSuccess);
}

#[test]
fn test_bad_arguments_are_errors() {
    let ws = Workspace::new(&[]);
    let missing = ws.path("does-not-exist");

    assert!(ws.run(&["scan", &missing]).is_err());
    assert!(ws.run(&["scan", &ws.root.display().to_string(), "-w", "0"]).is_err());
    assert!(ws
        .run(&["scan", &ws.root.display().to_string(), "--min-size", "10", "--max-size", "1"])
        .is_err());
    let root = ws.root.display().to_string();
    assert!(ws.run(&["list", "--prefer", &root, "--prefer", &root]).is_err());
}

#[test]
fn test_missing_directories_rejected_before_listing() {
    let ws = Workspace::new(&[("a", b"dup"), ("b", b"dup")]);
    let root = ws.root.display().to_string();
    ws.run(&["scan", &root]).unwrap();
    let missing = ws.path("does-not-exist");

    let err = ws.run(&["list", "--prefer", &missing]).unwrap_err();
    assert!(err.to_string().contains("not a directory"));
    let err = ws.run(&["list", "--within", &missing]).unwrap_err();
    assert!(err.to_string().contains("not a directory"));
    assert!(ws.run(&["delete", "--within", &ws.path("a")]).is_err());

    assert!(ws.root.join("a").exists());
    assert!(ws.root.join("b").exists());
}

#[test]
fn test_config_file_supplies_preferences() {
    let ws = Workspace::new(&[("main/a", b"dup"), ("zzz/a", b"dup"), ("b", b"dup")]);
    fs::write(
        &ws.config,
        format!("preferred = [\"{}\"]\n", ws.path("zzz")),
    )
    .unwrap();
    let root = ws.root.display().to_string();
    let out = ws.root.parent().unwrap().join("groups.json");
    ws.run(&["scan", &root]).unwrap();

    ws.run(&["list", "--format", "json", "-o", &out.display().to_string()])
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["duplicates"][0]["original"], ws.path("zzz/a"));
}

#[test]
fn test_config_init_writes_effective_settings() {
    let ws = Workspace::new(&[]);

    assert_eq!(ws.run(&["config"]).unwrap(), ExitCode::Success);
    assert!(!ws.config.exists());

    assert_eq!(ws.run(&["config", "--init"]).unwrap(), ExitCode::Success);
    let written = fs::read_to_string(&ws.config).unwrap();
    assert!(written.contains("index.db"));

    assert!(ws.run(&["config", "--init"]).is_err());
    assert_eq!(
        ws.run(&["config", "--init", "--force"]).unwrap(),
        ExitCode::Success
    );
}
