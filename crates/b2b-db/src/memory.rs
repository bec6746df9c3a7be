//! In-process customer store, optionally backed by a local snapshot file.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use b2b_core::{
    check_picture_count, defaults, new_v7, sort_newest_first, Customer, CustomerFields,
    CustomerPatch, CustomerStore, DeleteOutcome, Error, EventBus, OwnerId, RecordEvent, Result,
};

use crate::local_cache::SnapshotFile;
use crate::wipe::{table_for_collection, WipeTarget};

/// Customer store held in memory.
///
/// With [`MemoryCustomerStore::open_persistent`] every mutation is also
/// written to a [`SnapshotFile`]; a failed write rolls the mutation back so
/// memory and disk never disagree.
pub struct MemoryCustomerStore {
    records: RwLock<HashMap<Uuid, Customer>>,
    events: Arc<EventBus>,
    max_pictures: usize,
    snapshot: Option<SnapshotFile>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::with_max_pictures(defaults::MAX_PICTURES)
    }

    pub fn with_max_pictures(max_pictures: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            events: Arc::new(EventBus::default()),
            max_pictures,
            snapshot: None,
        }
    }

    /// Open a store persisted to `path`, loading whatever it already holds.
    pub async fn open_persistent(path: impl Into<PathBuf>, max_pictures: usize) -> Result<Self> {
        let snapshot = SnapshotFile::new(path);
        let loaded = snapshot.load().await?;
        let records = loaded.into_iter().map(|c| (c.id, c)).collect();
        info!(
            subsystem = "store",
            component = "memory_customers",
            path = %snapshot.path().display(),
            "Opened persistent customer store"
        );
        Ok(Self {
            records: RwLock::new(records),
            events: Arc::new(EventBus::default()),
            max_pictures,
            snapshot: Some(snapshot),
        })
    }

    /// Number of records across all owners.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn persist(&self, records: &HashMap<Uuid, Customer>) -> Result<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let mut all: Vec<Customer> = records.values().cloned().collect();
        sort_newest_first(&mut all);
        snapshot.save(&all).await
    }
}

impl Default for MemoryCustomerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn list(&self, owner: &OwnerId) -> Result<Vec<Customer>> {
        let records = self.records.read().await;
        let mut owned: Vec<Customer> = records
            .values()
            .filter(|c| &c.owner == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut owned);
        Ok(owned)
    }

    async fn get(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Customer>> {
        let records = self.records.read().await;
        Ok(records.get(&id).filter(|c| &c.owner == owner).cloned())
    }

    async fn create(
        &self,
        owner: &OwnerId,
        fields: CustomerFields,
        pictures: Vec<String>,
    ) -> Result<Uuid> {
        check_picture_count(pictures.len(), self.max_pictures)?;
        let now = Utc::now();
        let customer = Customer {
            id: new_v7(),
            owner: owner.clone(),
            fields,
            pictures,
            created_at: now,
            updated_at: now,
        };
        let id = customer.id;

        let mut records = self.records.write().await;
        records.insert(id, customer);
        if let Err(e) = self.persist(&records).await {
            records.remove(&id);
            return Err(e);
        }
        drop(records);

        debug!(
            subsystem = "store",
            component = "memory_customers",
            op = "create",
            owner = %owner,
            customer_id = %id,
            "Customer created"
        );
        self.events.emit(RecordEvent::CustomerCreated {
            owner: owner.clone(),
            customer_id: id,
        });
        Ok(id)
    }

    async fn patch(&self, owner: &OwnerId, id: Uuid, patch: CustomerPatch) -> Result<Customer> {
        let mut records = self.records.write().await;
        let current = records
            .get(&id)
            .filter(|c| &c.owner == owner)
            .cloned()
            .ok_or(Error::CustomerNotFound(id))?;

        let mut updated = current.clone();
        patch.apply_to(&mut updated, Utc::now(), self.max_pictures)?;
        records.insert(id, updated.clone());
        if let Err(e) = self.persist(&records).await {
            records.insert(id, current);
            return Err(e);
        }
        drop(records);

        debug!(
            subsystem = "store",
            component = "memory_customers",
            op = "patch",
            owner = %owner,
            customer_id = %id,
            pictures = updated.pictures.len(),
            "Customer patched"
        );
        self.events.emit(RecordEvent::CustomerUpdated {
            owner: owner.clone(),
            customer_id: id,
        });
        Ok(updated)
    }

    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<DeleteOutcome> {
        let mut records = self.records.write().await;
        let owned = records.get(&id).map(|c| &c.owner == owner).unwrap_or(false);
        if !owned {
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        let removed = records.remove(&id);
        if let Err(e) = self.persist(&records).await {
            if let Some(customer) = removed {
                records.insert(id, customer);
            }
            return Err(e);
        }
        drop(records);

        self.events.emit(RecordEvent::CustomerDeleted {
            owner: owner.clone(),
            customer_id: id,
        });
        Ok(DeleteOutcome::Removed)
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn max_pictures(&self) -> usize {
        self.max_pictures
    }
}

#[async_trait]
impl WipeTarget for MemoryCustomerStore {
    async fn delete_batch(&self, collection: &str, limit: i64) -> Result<u64> {
        if table_for_collection(collection)? != "customer" {
            warn!(collection, "wipe: collection not held by memory store, skipping");
            return Ok(0);
        }
        let mut records = self.records.write().await;
        let victims: Vec<Uuid> = records
            .keys()
            .take(limit.max(0) as usize)
            .copied()
            .collect();
        let removed: Vec<Customer> = victims.iter().filter_map(|id| records.remove(id)).collect();
        if let Err(e) = self.persist(&records).await {
            for customer in removed {
                records.insert(customer.id, customer);
            }
            return Err(e);
        }
        drop(records);

        let owners: BTreeSet<OwnerId> = removed.into_iter().map(|c| c.owner).collect();
        let deleted = victims.len() as u64;
        for owner in owners {
            self.events.emit(RecordEvent::OwnerChanged { owner });
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b2b_core::PicturesUpdate;
    use tempfile::TempDir;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn named(first: &str) -> CustomerFields {
        CustomerFields {
            first_name: first.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_sets_equal_timestamps() {
        let store = MemoryCustomerStore::new();
        let id = store.create(&owner("u1"), named("Ann"), vec![]).await.unwrap();
        let c = store.get(&owner("u1"), id).await.unwrap().unwrap();
        assert_eq!(c.created_at, c.updated_at);
        assert!(c.pictures.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped_and_newest_first() {
        let store = MemoryCustomerStore::new();
        let first = store.create(&owner("u1"), named("Ann"), vec![]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(&owner("u1"), named("Bob"), vec![]).await.unwrap();
        store.create(&owner("u2"), named("Eve"), vec![]).await.unwrap();

        let listed = store.list(&owner("u1")).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_patch_or_delete() {
        let store = MemoryCustomerStore::new();
        let id = store.create(&owner("u1"), named("Ann"), vec![]).await.unwrap();

        let err = store
            .patch(&owner("u2"), id, CustomerPatch::fields(named("Mallory")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CustomerNotFound(_)));
        assert_eq!(
            store.delete(&owner("u2"), id).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert!(store.get(&owner("u1"), id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_twice_is_idempotent() {
        let store = MemoryCustomerStore::new();
        let id = store.create(&owner("u1"), named("Ann"), vec![]).await.unwrap();
        assert_eq!(
            store.delete(&owner("u1"), id).await.unwrap(),
            DeleteOutcome::Removed
        );
        assert_eq!(
            store.delete(&owner("u1"), id).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn test_create_rejects_too_many_pictures() {
        let store = MemoryCustomerStore::with_max_pictures(2);
        let err = store
            .create(
                &owner("u1"),
                named("Ann"),
                vec!["a".into(), "b".into(), "c".into()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyPictures { count: 3, max: 2 }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_mutations_emit_events() {
        let store = MemoryCustomerStore::new();
        let mut rx = store.events().subscribe();
        let id = store.create(&owner("u1"), named("Ann"), vec![]).await.unwrap();
        store
            .patch(
                &owner("u1"),
                id,
                CustomerPatch::pictures(PicturesUpdate::AppendDistinct(vec!["x".into()])),
            )
            .await
            .unwrap();
        store.delete(&owner("u1"), id).await.unwrap();

        let types: Vec<String> = vec![
            rx.recv().await.unwrap().event_type,
            rx.recv().await.unwrap().event_type,
            rx.recv().await.unwrap().event_type,
        ];
        assert_eq!(
            types,
            vec!["customer.created", "customer.updated", "customer.deleted"]
        );
    }

    #[tokio::test]
    async fn test_persistent_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("customers.json");

        let id = {
            let store = MemoryCustomerStore::open_persistent(&path, 5).await.unwrap();
            let id = store
                .create(&owner("u1"), named("Ann"), vec!["https://x/1.png".into()])
                .await
                .unwrap();
            store
                .patch(&owner("u1"), id, CustomerPatch::fields(named("Anne")))
                .await
                .unwrap();
            id
        };

        let reopened = MemoryCustomerStore::open_persistent(&path, 5).await.unwrap();
        let c = reopened.get(&owner("u1"), id).await.unwrap().unwrap();
        assert_eq!(c.fields.first_name, "Anne");
        assert_eq!(c.pictures, vec!["https://x/1.png"]);
        assert!(c.updated_at >= c.created_at);
    }

    #[tokio::test]
    async fn test_wipe_batch_rolls_back_when_snapshot_write_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let store = MemoryCustomerStore::open_persistent(&path, 5).await.unwrap();
        store.create(&owner("u1"), named("Ann"), vec![]).await.unwrap();
        store.create(&owner("u2"), named("Bob"), vec![]).await.unwrap();

        // The snapshot's temp file cannot be created over a directory.
        std::fs::create_dir(dir.path().join("cache.tmp")).unwrap();
        let mut rx = store.events().subscribe();

        assert!(store.delete_batch("people", 10).await.is_err());
        assert_eq!(store.len().await, 2);
        assert_eq!(SnapshotFile::new(&path).load().await.unwrap().len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_wipe_batches_only_customer_collection() {
        let store = MemoryCustomerStore::new();
        for name in ["A", "B", "C"] {
            store.create(&owner("u1"), named(name), vec![]).await.unwrap();
        }
        assert_eq!(store.delete_batch("projects", 10).await.unwrap(), 0);
        assert_eq!(store.delete_batch("people", 2).await.unwrap(), 2);
        assert_eq!(store.delete_batch("people", 2).await.unwrap(), 1);
        assert_eq!(store.delete_batch("people", 2).await.unwrap(), 0);
    }
}
