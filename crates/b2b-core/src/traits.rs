//! Core traits for bid2build adapters.
//!
//! These traits define the interfaces that concrete stores and blob backends
//! must satisfy, keeping the form controller independent of where records
//! and pictures actually live.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::events::EventBus;
use crate::models::*;

// =============================================================================
// RECORD STORE
// =============================================================================

/// Owner-scoped customer record store.
///
/// Every successful mutation must emit a matching
/// [`RecordEvent`](crate::RecordEvent) on [`CustomerStore::events`] so live
/// feeds can refresh.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// All of the owner's records, newest `created_at` first.
    async fn list(&self, owner: &OwnerId) -> Result<Vec<Customer>>;

    /// Fetch one record; `None` when absent or owned by someone else.
    async fn get(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Customer>>;

    /// Create a record. Timestamps are assigned here and equal at creation.
    async fn create(
        &self,
        owner: &OwnerId,
        fields: CustomerFields,
        pictures: Vec<String>,
    ) -> Result<Uuid>;

    /// Merge a patch and refresh `updated_at`.
    ///
    /// Returns `Error::CustomerNotFound` when the record is gone and
    /// `Error::TooManyPictures` when the merged list would exceed the limit.
    async fn patch(&self, owner: &OwnerId, id: Uuid, patch: CustomerPatch) -> Result<Customer>;

    /// Delete a record. Deleting a missing id reports `AlreadyAbsent`.
    async fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<DeleteOutcome>;

    /// Bus carrying this store's change events.
    fn events(&self) -> &EventBus;

    /// Picture limit enforced on create and patch.
    fn max_pictures(&self) -> usize;
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// Uploads picture bytes and hands back an independently resolvable URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &BlobPath, content_type: &str, data: &[u8]) -> Result<String>;
}
