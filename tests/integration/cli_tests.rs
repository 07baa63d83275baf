use clap::Parser;
use lorekeeper::cache::FreshnessCache;
use lorekeeper::cli::Cli;
use lorekeeper::error::{exit_code_for, ExitCode};
use lorekeeper::run_app;
use lorekeeper::store::{MemoryVectorStore, VectorStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

struct Workspace {
    lore: TempDir,
    state: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            lore: tempdir().unwrap(),
            state: tempdir().unwrap(),
        };
        fs::write(ws.state.path().join("config.toml"), "").unwrap();
        fs::write(ws.lore.path().join("a.md"), "Alpha").unwrap();
        fs::write(ws.lore.path().join("b.txt"), "Beta").unwrap();
        ws
    }

    fn cache(&self) -> PathBuf {
        self.state.path().join("embed_cache.json")
    }

    fn store(&self) -> PathBuf {
        self.state.path().join("lore_store.json")
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let config = self.state.path().join("config.toml");
        let mut argv = vec!["lorekeeper", "-q", "--config", config.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_app(Cli::try_parse_from(argv).unwrap())
    }

    fn ingest(&self, extra: &[&str]) -> anyhow::Result<ExitCode> {
        let lore = path_arg(self.lore.path());
        let cache = path_arg(&self.cache());
        let store = path_arg(&self.store());
        let mut args = vec![
            "ingest",
            lore.as_str(),
            "--cache",
            cache.as_str(),
            "--store",
            store.as_str(),
        ];
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

impl Workspace {
    /// Run the built binary and capture stdout.
    fn output(&self, args: &[&str]) -> (i32, String) {
        let output = Command::new(env!("CARGO_BIN_EXE_lorekeeper"))
            .arg("--config")
            .arg(self.state.path().join("config.toml"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap();
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
        )
    }

    fn scan_args(&self, command: &str) -> Vec<String> {
        vec![
            command.to_string(),
            path_arg(self.lore.path()),
            "--cache".to_string(),
            path_arg(&self.cache()),
            "--store".to_string(),
            path_arg(&self.store()),
        ]
    }
}

#[test]
fn test_ingest_writes_store_and_cache() {
    let ws = Workspace::new();
    assert_eq!(ws.ingest(&[]).unwrap(), ExitCode::Success);

    assert_eq!(FreshnessCache::load(&ws.cache()).unwrap().len(), 2);
    assert_eq!(MemoryVectorStore::load(&ws.store()).unwrap().len(), 2);

    // Nothing changed: still success, store untouched in content
    assert_eq!(ws.ingest(&[]).unwrap(), ExitCode::Success);
    assert_eq!(MemoryVectorStore::load(&ws.store()).unwrap().len(), 2);
}

#[test]
fn test_dry_run_writes_nothing() {
    let ws = Workspace::new();
    assert_eq!(ws.ingest(&["--dry-run"]).unwrap(), ExitCode::Success);
    assert!(!ws.cache().exists());
    assert!(!ws.store().exists());
}

#[test]
fn test_status_does_not_mutate() {
    let ws = Workspace::new();
    let lore = path_arg(ws.lore.path());
    let cache = path_arg(&ws.cache());
    assert_eq!(
        ws.run(&["status", lore.as_str(), "--cache", cache.as_str()]).unwrap(),
        ExitCode::Success
    );
    assert!(!ws.cache().exists());
}

#[test]
fn test_unreadable_file_gives_partial_success() {
    let ws = Workspace::new();
    fs::write(ws.lore.path().join("broken.md"), [0xff, 0xff]).unwrap();

    assert_eq!(ws.ingest(&[]).unwrap(), ExitCode::PartialSuccess);
    let cache = FreshnessCache::load(&ws.cache()).unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_cache_persist_failure_exit_code() {
    let ws = Workspace::new();
    let blocker = ws.state.path().join("blocker");
    fs::write(&blocker, "file in the way").unwrap();

    let lore = path_arg(ws.lore.path());
    let cache = path_arg(&blocker.join("embed_cache.json"));
    let store = path_arg(&ws.store());
    let err = ws
        .run(&[
            "ingest",
            lore.as_str(),
            "--cache",
            cache.as_str(),
            "--store",
            store.as_str(),
        ])
        .unwrap_err();

    assert_eq!(exit_code_for(&err), ExitCode::CachePersistFailed);
    // The store was saved before the cache
    assert_eq!(MemoryVectorStore::load(&ws.store()).unwrap().len(), 2);
}

#[test]
fn test_lost_store_is_rebuilt_from_files() {
    let ws = Workspace::new();
    ws.ingest(&[]).unwrap();
    fs::remove_file(ws.store()).unwrap();

    assert_eq!(ws.ingest(&[]).unwrap(), ExitCode::Success);
    assert_eq!(MemoryVectorStore::load(&ws.store()).unwrap().len(), 2);
}

#[test]
fn test_prune_removes_deleted_files() {
    let ws = Workspace::new();
    ws.ingest(&[]).unwrap();
    fs::remove_file(ws.lore.path().join("b.txt")).unwrap();

    assert_eq!(ws.ingest(&["--prune"]).unwrap(), ExitCode::Success);
    assert_eq!(FreshnessCache::load(&ws.cache()).unwrap().len(), 1);
    assert_eq!(MemoryVectorStore::load(&ws.store()).unwrap().len(), 1);
}

#[test]
fn test_query_after_ingest() {
    let ws = Workspace::new();
    ws.ingest(&[]).unwrap();

    let store = path_arg(&ws.store());
    let code = ws
        .run(&["query", "alpha", "--store", store.as_str(), "--output", "json"])
        .unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_query_without_store_fails() {
    let ws = Workspace::new();
    let store = path_arg(&ws.store());
    let err = ws.run(&["query", "alpha", "--store", store.as_str()]).unwrap_err();
    assert_eq!(exit_code_for(&err), ExitCode::GeneralError);
    assert!(format!("{err:#}").contains("lorekeeper ingest"));
}

#[test]
fn test_missing_root_is_general_error() {
    let ws = Workspace::new();
    let missing = path_arg(&ws.lore.path().join("nowhere"));
    let cache = path_arg(&ws.cache());
    let store = path_arg(&ws.store());
    let err = ws
        .run(&[
            "ingest",
            missing.as_str(),
            "--cache",
            cache.as_str(),
            "--store",
            store.as_str(),
        ])
        .unwrap_err();
    assert_eq!(exit_code_for(&err), ExitCode::GeneralError);
    assert!(!ws.cache().exists());
}

#[test]
fn test_status_after_lost_store_lists_every_file() {
    let ws = Workspace::new();
    ws.ingest(&[]).unwrap();

    let args = ws.scan_args("status");
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let (code, stdout) = ws.output(&args);
    assert_eq!(code, 0);
    assert!(stdout.contains("0 to embed"), "{stdout}");

    fs::remove_file(ws.store()).unwrap();
    let (code, stdout) = ws.output(&args);
    assert_eq!(code, 0);
    assert!(stdout.contains("a.md"), "{stdout}");
    assert!(stdout.contains("b.txt"), "{stdout}");
    assert!(stdout.contains("2 to embed"), "{stdout}");
    assert!(!ws.store().exists());
    assert_eq!(FreshnessCache::load(&ws.cache()).unwrap().len(), 2);
}

#[test]
fn test_dry_run_after_lost_store_lists_every_file() {
    let ws = Workspace::new();
    ws.ingest(&[]).unwrap();
    fs::remove_file(ws.store()).unwrap();

    let mut args = ws.scan_args("ingest");
    args.push("--dry-run".to_string());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let (code, stdout) = ws.output(&args);
    assert_eq!(code, 0);
    assert!(stdout.contains("new  ") && stdout.contains("a.md"), "{stdout}");
    assert!(stdout.contains("2 to embed"), "{stdout}");
    assert!(!ws.store().exists());
}

#[test]
fn test_query_prints_answer_and_sources() {
    let ws = Workspace::new();
    fs::write(
        ws.lore.path().join("dragons.md"),
        "The red dragon Ignarath sleeps under Mount Cinder. Pilgrims avoid the slopes.",
    )
    .unwrap();
    ws.ingest(&[]).unwrap();

    let store = path_arg(&ws.store());
    let (code, stdout) = ws.output(&[
        "query",
        "Where does the red dragon sleep?",
        "--store",
        store.as_str(),
        "-k",
        "1",
    ]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("The red dragon Ignarath sleeps under Mount Cinder."), "{stdout}");
    assert!(stdout.contains("Sources: "), "{stdout}");
    assert!(stdout.contains("1. "), "{stdout}");

    let (code, stdout) = ws.output(&[
        "query",
        "Where does the red dragon sleep?",
        "--store",
        store.as_str(),
        "--passages-only",
        "--output",
        "json",
    ]);
    assert_eq!(code, 0);
    let hits: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(hits.as_array().unwrap()[0]["source"]
        .as_str()
        .unwrap()
        .ends_with("dragons.md"));
}
