//! Administrative wipe over the persisted in-memory store.

use b2b_db::{
    parse_collections, wipe, CustomerFields, CustomerStore, MemoryCustomerStore, OwnerId,
    SecondaryOutcome, SnapshotFile,
};
use tempfile::TempDir;

fn named(first: &str) -> CustomerFields {
    CustomerFields {
        first_name: first.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_wipe_empties_people_and_clears_snapshot() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store.json");
    let store = MemoryCustomerStore::open_persistent(&store_path, 5)
        .await
        .unwrap();
    let owner = OwnerId::new("u1").unwrap();
    for i in 0..5 {
        store
            .create(&owner, named(&format!("P{i}")), vec![])
            .await
            .unwrap();
    }

    let secondary = SnapshotFile::new(dir.path().join("rtdb.json"));
    secondary.save(&store.list(&owner).await.unwrap()).await.unwrap();

    let collections = parse_collections("people,products,projects");
    let report = wipe(&store, &collections, 2, Some(&secondary))
        .await
        .unwrap();

    assert_eq!(report.collections[0].deleted, 5);
    assert_eq!(report.collections[0].batches, 3);
    assert!(report.collections[1].skipped);
    assert!(report.collections[2].skipped);
    assert_eq!(report.secondary, SecondaryOutcome::Cleared);
    assert!(store.list(&owner).await.unwrap().is_empty());
    assert!(secondary.load().await.unwrap().is_empty());

    let reopened = MemoryCustomerStore::open_persistent(&store_path, 5)
        .await
        .unwrap();
    assert!(reopened.is_empty().await);
}

#[tokio::test]
async fn test_wipe_without_secondary_snapshot_warns_and_succeeds() {
    let dir = TempDir::new().unwrap();
    let store = MemoryCustomerStore::new();
    let missing = SnapshotFile::new(dir.path().join("never-created.json"));

    let report = wipe(&store, &["people".to_string()], 200, Some(&missing))
        .await
        .unwrap();
    assert_eq!(report.total_deleted(), 0);
    assert!(matches!(report.secondary, SecondaryOutcome::Skipped(_)));
}

#[tokio::test]
async fn test_wipe_rejects_unsafe_collection_names() {
    let store = MemoryCustomerStore::new();
    let result = wipe(&store, &["people; DROP TABLE x".to_string()], 200, None).await;
    assert!(result.is_err());
}
