use lorekeeper::cache::FreshnessCache;
use lorekeeper::ingest::{run_pipeline, IngestError, IngestOptions};
use lorekeeper::scanner::WalkerConfig;
use lorekeeper::store::{retrieve, Embedder, HashedEmbedder, MemoryVectorStore, VectorStore};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn write_lore(root: &std::path::Path) {
    fs::write(
        root.join("sharn.md"),
        "Sharn is the city of towers, ruled by Lord Mayor Lorrister Cantorn.",
    )
    .unwrap();
    fs::write(
        root.join("mournland.txt"),
        "The Mournland is a dead grey mist where Cyre once stood.",
    )
    .unwrap();
    fs::write(
        root.join("airships.md"),
        "House Lyrandar pilots elemental airships bound with fire rings.",
    )
    .unwrap();
}

#[test]
fn test_ingest_save_reload_and_query() {
    let lore = tempdir().unwrap();
    let state = tempdir().unwrap();
    write_lore(lore.path());
    let cache_path = state.path().join("embed_cache.json");
    let store_path = state.path().join("lore_store.json");

    let embedder = HashedEmbedder::new(256);
    let mut store = MemoryVectorStore::new(embedder.model_label(), embedder.dimension());
    let mut cache = FreshnessCache::new();
    let report = run_pipeline(
        lore.path(),
        &mut cache,
        &embedder,
        &mut store,
        2,
        &IngestOptions::default(),
    )
    .unwrap();
    assert_eq!(report.embedded.len(), 3);

    store.save(&store_path).unwrap();
    cache.save(&cache_path).unwrap();

    let store = MemoryVectorStore::load(&store_path).unwrap();
    assert_eq!(store.len(), 3);
    let hits = retrieve(&embedder, &store, "Who rules the city of towers?", 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].source.ends_with("sharn.md"));
    assert!(hits[0].score >= hits[1].score);
}

#[test]
fn test_modified_file_replaces_stored_document() {
    let lore = tempdir().unwrap();
    write_lore(lore.path());
    let embedder = HashedEmbedder::new(128);
    let mut store = MemoryVectorStore::new(embedder.model_label(), embedder.dimension());
    let mut cache = FreshnessCache::new();
    let options = IngestOptions::default();

    run_pipeline(lore.path(), &mut cache, &embedder, &mut store, 8, &options).unwrap();
    fs::write(lore.path().join("sharn.md"), "Sharn fell into the Dagger River.").unwrap();
    let report =
        run_pipeline(lore.path(), &mut cache, &embedder, &mut store, 8, &options).unwrap();

    assert_eq!(report.embedded.len(), 1);
    assert_eq!(report.unchanged, 2);
    assert_eq!(store.len(), 3);
    let sharn = lore.path().join("sharn.md");
    let stored = store.get(sharn.to_str().unwrap()).unwrap();
    assert!(stored.content.contains("Dagger River"));
}

#[test]
fn test_interrupted_pipeline_records_nothing() {
    let lore = tempdir().unwrap();
    write_lore(lore.path());
    let embedder = HashedEmbedder::new(64);
    let mut store = MemoryVectorStore::new(embedder.model_label(), embedder.dimension());
    let mut cache = FreshnessCache::new();

    let options = IngestOptions::new(WalkerConfig::default())
        .with_shutdown_flag(Arc::new(AtomicBool::new(true)));
    let err = run_pipeline(lore.path(), &mut cache, &embedder, &mut store, 1, &options)
        .unwrap_err();

    assert!(matches!(err, IngestError::Interrupted));
    assert!(cache.is_empty());
    assert!(store.is_empty());
}

#[test]
fn test_dimension_mismatch_fails_every_batch() {
    let lore = tempdir().unwrap();
    write_lore(lore.path());
    let embedder = HashedEmbedder::new(64);
    let mut store = MemoryVectorStore::new("hashed-32", 32);
    let mut cache = FreshnessCache::new();

    let report = run_pipeline(
        lore.path(),
        &mut cache,
        &embedder,
        &mut store,
        2,
        &IngestOptions::default(),
    )
    .unwrap();

    assert!(report.is_partial());
    assert_eq!(report.failed_documents(), 3);
    assert!(report.embedded.is_empty());
    assert!(cache.is_empty());
}
