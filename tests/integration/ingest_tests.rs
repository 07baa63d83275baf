use lorekeeper::cache::{CacheError, FreshnessCache};
use lorekeeper::ingest::{collect_changed_documents, FileError, IngestError, IngestOptions};
use lorekeeper::scanner::WalkerConfig;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn sources(documents: &[lorekeeper::document::Document]) -> Vec<String> {
    documents
        .iter()
        .map(|d| {
            Path::new(d.source())
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn test_alpha_beta_scenario() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache_path = state.path().join("embed_cache.json");
    fs::write(lore.path().join("a.md"), "Alpha").unwrap();
    fs::write(lore.path().join("b.txt"), "Beta").unwrap();
    let options = IngestOptions::default();

    let mut cache = FreshnessCache::load(&cache_path).unwrap();
    let first = collect_changed_documents(lore.path(), &mut cache, &cache_path, &options).unwrap();
    assert_eq!(sources(&first.documents), vec!["a.md", "b.txt"]);
    assert_eq!(first.documents[0].content, "Alpha");
    assert_eq!(cache.len(), 2);
    assert_eq!(FreshnessCache::load(&cache_path).unwrap().len(), 2);

    let mut cache = FreshnessCache::load(&cache_path).unwrap();
    let second =
        collect_changed_documents(lore.path(), &mut cache, &cache_path, &options).unwrap();
    assert!(second.documents.is_empty());
    assert_eq!(second.unchanged, 2);

    fs::write(lore.path().join("a.md"), "Alpha2").unwrap();
    let mut cache = FreshnessCache::load(&cache_path).unwrap();
    let third = collect_changed_documents(lore.path(), &mut cache, &cache_path, &options).unwrap();
    assert_eq!(sources(&third.documents), vec!["a.md"]);
    assert_eq!(third.documents[0].content, "Alpha2");
}

#[test]
fn test_only_configured_extensions_are_collected() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::write(lore.path().join("a.md"), "Alpha").unwrap();
    fs::write(lore.path().join("map.png"), [0u8, 1, 2]).unwrap();
    fs::write(lore.path().join("notes.ORG"), "Gamma").unwrap();

    let options = IngestOptions::new(WalkerConfig::default().with_extensions(["org"]));
    let mut cache = FreshnessCache::new();
    let collection = collect_changed_documents(
        lore.path(),
        &mut cache,
        &state.path().join("c.json"),
        &options,
    )
    .unwrap();

    assert_eq!(sources(&collection.documents), vec!["notes.ORG"]);
}

#[test]
fn test_nested_directories_are_walked() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::create_dir_all(lore.path().join("factions/houses")).unwrap();
    fs::write(lore.path().join("factions/houses/cannith.md"), "Makers").unwrap();
    fs::write(lore.path().join("intro.txt"), "Welcome").unwrap();

    let mut cache = FreshnessCache::new();
    let collection = collect_changed_documents(
        lore.path(),
        &mut cache,
        &state.path().join("c.json"),
        &IngestOptions::default(),
    )
    .unwrap();

    assert_eq!(collection.documents.len(), 2);
    assert!(collection
        .sources()
        .any(|s| s.ends_with("cannith.md") && s.contains("houses")));
}

#[test]
fn test_deleted_file_is_omitted_and_entry_kept() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache_path = state.path().join("embed_cache.json");
    fs::write(lore.path().join("a.md"), "Alpha").unwrap();
    fs::write(lore.path().join("b.txt"), "Beta").unwrap();

    let mut cache = FreshnessCache::new();
    collect_changed_documents(lore.path(), &mut cache, &cache_path, &IngestOptions::default())
        .unwrap();

    fs::remove_file(lore.path().join("b.txt")).unwrap();
    let mut cache = FreshnessCache::load(&cache_path).unwrap();
    let collection =
        collect_changed_documents(lore.path(), &mut cache, &cache_path, &IngestOptions::default())
            .unwrap();

    assert!(collection.documents.is_empty());
    assert_eq!(collection.files_seen, 1);
    assert!(!collection.has_errors());
    // The stale entry stays until pruned
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.prune_missing().len(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_unreadable_text_is_skipped_and_retried() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache_path = state.path().join("embed_cache.json");
    let bad = lore.path().join("bad.md");
    fs::write(&bad, [0xc3, 0x28]).unwrap();
    fs::write(lore.path().join("good.md"), "Good").unwrap();

    let mut cache = FreshnessCache::new();
    let collection =
        collect_changed_documents(lore.path(), &mut cache, &cache_path, &IngestOptions::default())
            .unwrap();

    assert_eq!(sources(&collection.documents), vec!["good.md"]);
    assert!(matches!(collection.errors.as_slice(), [FileError::Document(_)]));
    assert!(cache.get(bad.to_str().unwrap()).is_none());

    fs::write(&bad, "Fixed").unwrap();
    let retry =
        collect_changed_documents(lore.path(), &mut cache, &cache_path, &IngestOptions::default())
            .unwrap();
    assert_eq!(sources(&retry.documents), vec!["bad.md"]);
}

#[cfg(unix)]
#[test]
fn test_permission_denied_file_is_collected_as_error() {
    use std::os::unix::fs::PermissionsExt;

    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache_path = state.path().join("embed_cache.json");
    let locked = lore.path().join("locked.md");
    fs::write(&locked, "Secret").unwrap();
    fs::write(lore.path().join("open.md"), "Open").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root reads through any mode bits
    if fs::read(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let mut cache = FreshnessCache::new();
    let collection =
        collect_changed_documents(lore.path(), &mut cache, &cache_path, &IngestOptions::default())
            .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(sources(&collection.documents), vec!["open.md"]);
    assert!(matches!(
        collection.errors.as_slice(),
        [FileError::Cache(CacheError::Io { .. })]
    ));
    assert!(cache.get(locked.to_str().unwrap()).is_none());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_persist_failure_keeps_documents() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    fs::write(lore.path().join("a.md"), "Alpha").unwrap();
    let blocker = state.path().join("blocker");
    fs::write(&blocker, "file in the way").unwrap();

    let mut cache = FreshnessCache::new();
    let err = collect_changed_documents(
        lore.path(),
        &mut cache,
        &blocker.join("embed_cache.json"),
        &IngestOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, IngestError::Persist { .. }));
    let collection = err.into_collection().unwrap();
    assert_eq!(sources(&collection.documents), vec!["a.md"]);
}

#[test]
fn test_missing_root_is_an_error() {
    let state = tempdir().unwrap();
    let mut cache = FreshnessCache::new();
    let err = collect_changed_documents(
        &state.path().join("no_such_campaign"),
        &mut cache,
        &state.path().join("c.json"),
        &IngestOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, IngestError::Root { .. }));
    assert!(!state.path().join("c.json").exists());
}

#[test]
fn test_empty_directory_yields_nothing() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    let cache_path = state.path().join("c.json");
    let mut cache = FreshnessCache::new();

    let collection =
        collect_changed_documents(lore.path(), &mut cache, &cache_path, &IngestOptions::default())
            .unwrap();

    assert!(collection.documents.is_empty());
    assert!(cache_path.exists());
}
