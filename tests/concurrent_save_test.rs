//! Concurrent saves, latest resolution and listing.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gg_store::adapters::{builtin_registry, EntityRuler, ENTITY_RULER_ID};
use gg_store::models::MANIFEST_FILE;
use gg_store::{ModelStore, SaveOptions, TagRef};
use tempfile::TempDir;

fn create_store(home: &Path) -> ModelStore {
    let registry = builtin_registry(Vec::<(String, String)>::new()).unwrap();
    ModelStore::new(home, Arc::new(registry))
}

fn ruler(phrase: &str) -> EntityRuler {
    let mut ruler = EntityRuler::new("en");
    ruler.add_pattern("ORG", phrase);
    ruler
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_get_distinct_tags() {
    const N: usize = 16;
    let home = TempDir::new().unwrap();
    let store = Arc::new(create_store(home.path()));

    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .save("shared", &ruler(&format!("Org{}", i)), ENTITY_RULER_ID, SaveOptions::new())
                .await
        }));
    }

    let mut tags = HashSet::new();
    for handle in handles {
        tags.insert(handle.await.unwrap().unwrap());
    }
    assert_eq!(tags.len(), N);

    // Every version directory on disk is fully committed.
    let mut dirs = 0;
    for entry in std::fs::read_dir(home.path().join("shared")).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            dirs += 1;
            assert!(entry.path().join(MANIFEST_FILE).is_file());
        }
    }
    assert_eq!(dirs, N);
    assert_eq!(store.list(Some("shared")).await.unwrap().len(), N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_artifacts() {
    let home = TempDir::new().unwrap();
    let store = Arc::new(create_store(home.path()));
    store
        .save("shared", &ruler("Seed"), ENTITY_RULER_ID, SaveOptions::new())
        .await
        .unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for i in 0..8 {
                store
                    .save("shared", &ruler(&format!("W{}", i)), ENTITY_RULER_ID, SaveOptions::new())
                    .await
                    .unwrap();
            }
        })
    };

    for _ in 0..32 {
        // Whatever latest is right now must load cleanly.
        let loaded: EntityRuler = store.load("shared").await.unwrap();
        assert_eq!(loaded.patterns().len(), 1);
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
}

#[tokio::test]
async fn test_latest_is_most_recent_save() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());

    let mut last = None;
    for phrase in ["First", "Second", "Third"] {
        last = Some(
            store
                .save("ner", &ruler(phrase), ENTITY_RULER_ID, SaveOptions::new())
                .await
                .unwrap(),
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let last = last.unwrap();

    let manifest = store.get("ner").await.unwrap();
    assert_eq!(manifest.version, last.version());
    let explicit = store.get(&TagRef::parse("ner:latest").unwrap()).await.unwrap();
    assert_eq!(explicit.version, last.version());

    let loaded: EntityRuler = store.load("ner").await.unwrap();
    assert_eq!(loaded.patterns()[0].phrase, "Third");
}

#[tokio::test]
async fn test_pending_directory_is_not_listed() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());
    let tag = store
        .save("ner", &ruler("Acme"), ENTITY_RULER_ID, SaveOptions::new())
        .await
        .unwrap();

    // Simulate a crash after allocation: directory and payload, no manifest.
    let orphan = home.path().join("ner").join("29991231235959999999_00000000");
    std::fs::create_dir_all(&orphan).unwrap();
    std::fs::write(orphan.join("meta.json"), "{}").unwrap();

    let listed = store.list(None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, tag.version());
    assert_eq!(store.get("ner").await.unwrap().version, tag.version());
}

#[tokio::test]
async fn test_list_orders_newest_first_per_name() {
    let home = TempDir::new().unwrap();
    let store = create_store(home.path());
    let a1 = store.save("alpha", &ruler("A"), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let a2 = store.save("alpha", &ruler("B"), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();
    store.save("beta", &ruler("C"), ENTITY_RULER_ID, SaveOptions::new()).await.unwrap();

    let listed = store.list(None).await.unwrap();
    let order: Vec<(&str, &str)> =
        listed.iter().map(|m| (m.name.as_str(), m.version.as_str())).collect();
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], ("alpha", a2.version()));
    assert_eq!(order[1], ("alpha", a1.version()));
    assert_eq!(order[2].0, "beta");
}
