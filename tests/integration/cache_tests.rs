use lorekeeper::cache::{fingerprint, CacheError, Fingerprint, FreshnessCache};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_missing_cache_loads_empty() {
    let dir = tempdir().unwrap();
    let cache = FreshnessCache::load(&dir.path().join("never_written.json")).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_cache_round_trip() {
    let dir = tempdir().unwrap();
    let lore = dir.path().join("lore");
    fs::create_dir(&lore).unwrap();
    let a = lore.join("a.md");
    fs::write(&a, "Alpha").unwrap();

    let mut cache = FreshnessCache::new();
    cache.record_processed(a.to_str().unwrap()).unwrap();
    cache.record_fingerprint("lore/ghost.md", Fingerprint::of_bytes(b"Boo"));

    let path = dir.path().join("state").join("embed_cache.json");
    cache.save(&path).unwrap();
    let reloaded = FreshnessCache::load(&path).unwrap();
    assert_eq!(reloaded, cache);

    // Saving what was loaded reproduces the same record
    reloaded.save(&path).unwrap();
    assert_eq!(FreshnessCache::load(&path).unwrap(), cache);
}

#[test]
fn test_cache_file_is_flat_json_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("embed_cache.json");

    let mut cache = FreshnessCache::new();
    cache.record_fingerprint("lore/b.txt", Fingerprint::of_bytes(b"Beta"));
    cache.record_fingerprint("lore/a.md", Fingerprint::of_bytes(b"Alpha"));
    cache.save(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let map = value.as_object().unwrap();
    assert_eq!(map.len(), 2);
    let digest = map["lore/a.md"].as_str().unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_corrupt_cache_recovers_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("embed_cache.json");

    let samples: [&[u8]; 4] = [
        b"{ not json",
        b"[1, 2, 3]",
        b"{\"a.md\": \"xyz\"}",
        &[0xff, 0xfe, 0x00],
    ];
    for garbage in samples {
        fs::write(&path, garbage).unwrap();
        assert!(matches!(
            FreshnessCache::load(&path),
            Err(CacheError::Corrupt { .. })
        ));
        assert!(FreshnessCache::load_or_empty(&path).is_empty());
    }
}

#[test]
fn test_save_failure_is_persist_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "file").unwrap();

    let mut cache = FreshnessCache::new();
    cache.record_fingerprint("a.md", Fingerprint::of_bytes(b"Alpha"));
    let err = cache.save(&blocker.join("embed_cache.json")).unwrap_err();
    assert!(matches!(err, CacheError::Persist { .. }));
}

#[test]
fn test_fingerprint_is_deterministic_and_content_sensitive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.md");
    fs::write(&path, "The Lord of Blades waits in the Mournland.").unwrap();

    let first = fingerprint(&path).unwrap();
    assert_eq!(first, fingerprint(&path).unwrap());

    let original = fs::read(&path).unwrap();
    for index in [0, original.len() / 2, original.len() - 1] {
        let mut mutated = original.clone();
        mutated[index] ^= 0x01;
        fs::write(&path, &mutated).unwrap();
        assert_ne!(fingerprint(&path).unwrap(), first, "byte {index} flipped");
    }
}

#[test]
fn test_fingerprint_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        fingerprint(&dir.path().join("gone.md")),
        Err(CacheError::Io { .. })
    ));
}
