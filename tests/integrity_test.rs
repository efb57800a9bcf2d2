//! Payload digest recording and verification.

use std::path::Path;
use std::sync::Arc;

use gg_store::adapters::{builtin_registry, EntityRuler, ENTITY_RULER_ID};
use gg_store::models::MANIFEST_FILE;
use gg_store::{ModelStore, SaveOptions, StoreError};
use tempfile::TempDir;

fn create_store(home: &Path) -> ModelStore {
    let registry = builtin_registry(Vec::<(String, String)>::new()).unwrap();
    ModelStore::new(home, Arc::new(registry))
}

fn ruler() -> EntityRuler {
    let mut ruler = EntityRuler::new("en");
    ruler.add_pattern("ORG", "Google");
    ruler
}

#[tokio::test]
async fn test_verify_matches_recorded_digest() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());
    let tag = store.save("ner", &ruler(), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();

    let recorded = store.get(&tag).await.unwrap().digest.unwrap();
    let verified = store.verify(&tag).await.unwrap();
    assert_eq!(recorded, verified);
    assert_eq!(verified.algorithm, "sha256");
    assert_eq!(verified.file_count, 2);
}

#[tokio::test]
async fn test_tampered_payload_detected() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());
    let tag = store.save("ner", &ruler(), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();

    let patterns = store.path_of(&tag).join("patterns.json");
    std::fs::write(&patterns, r#"[{"label":"ORG","phrase":"Evil Corp"}]"#).unwrap();

    let err = store.verify(&tag).await.unwrap_err();
    assert!(matches!(err, StoreError::IntegrityMismatch { .. }));

    // Without verify_on_load the tampered model still loads.
    let loaded: EntityRuler = store.load(&tag).await.unwrap();
    assert_eq!(loaded.patterns()[0].phrase, "Evil Corp");

    let strict = create_store(home.path()).with_verify_on_load(true);
    let err = strict.load::<EntityRuler, _>(&tag).await.unwrap_err();
    assert!(matches!(err, StoreError::IntegrityMismatch { .. }));
}

#[tokio::test]
async fn test_extra_file_changes_digest() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());
    let tag = store.save("ner", &ruler(), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();

    std::fs::write(store.path_of(&tag).join("extra.bin"), b"\x00\x01").unwrap();
    assert!(matches!(
        store.verify(&tag).await.unwrap_err(),
        StoreError::IntegrityMismatch { .. }
    ));
}

#[tokio::test]
async fn test_manifest_edits_do_not_affect_digest() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());
    let tag = store.save("ner", &ruler(), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();

    let path = store.path_of(&tag).join(MANIFEST_FILE);
    let mut doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    doc["options"]["note"] = serde_json::json!("edited by hand");
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    assert!(store.verify(&tag).await.is_ok());
}
