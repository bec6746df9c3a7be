//! Administrative data wipe.
//!
//! Deletes every row of the named collections in fixed-size batches, then
//! clears the secondary store (the local snapshot). Blob storage is never
//! touched. Child rows go with their parents through `ON DELETE CASCADE`.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use b2b_core::Result;

use crate::identifiers::validate_identifier;

/// Something whose collections can be emptied batch by batch.
#[async_trait]
pub trait WipeTarget: Send + Sync {
    /// Whether the collection exists here at all.
    async fn has_collection(&self, collection: &str) -> Result<bool> {
        Ok(table_for_collection(collection)? == "customer")
    }

    /// Delete up to `limit` rows of `collection`, returning how many went.
    async fn delete_batch(&self, collection: &str, limit: i64) -> Result<u64>;
}

/// Real-time/secondary store whose root is reset after the collections.
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    fn describe(&self) -> String;

    async fn clear_root(&self) -> Result<()>;
}

/// Deletions for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionWipe {
    pub collection: String,
    pub deleted: u64,
    pub batches: u32,
    /// Collection was not present and nothing was attempted.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryOutcome {
    Cleared,
    NotConfigured,
    /// Clearing failed; the wipe still counts as done.
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeReport {
    pub collections: Vec<CollectionWipe>,
    pub secondary: SecondaryOutcome,
}

impl WipeReport {
    pub fn total_deleted(&self) -> u64 {
        self.collections.iter().map(|c| c.deleted).sum()
    }
}

/// Split a comma-separated collection list, trimming and dropping blanks
/// and repeats.
pub fn parse_collections(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Table backing a collection name. `people` is the historical name of the
/// customer collection.
pub fn table_for_collection(collection: &str) -> Result<String> {
    validate_identifier(collection)?;
    let table = match collection.to_ascii_lowercase().as_str() {
        "people" | "customers" | "customer" => "customer".to_string(),
        "projects" | "project" => "project".to_string(),
        "products" | "product" => "product".to_string(),
        other => other.to_string(),
    };
    Ok(table)
}

/// Empty every collection, then clear the secondary store.
///
/// Collection failures abort the wipe. Secondary-store failures are logged
/// and reported but do not fail it.
pub async fn wipe(
    target: &dyn WipeTarget,
    collections: &[String],
    batch_size: i64,
    secondary: Option<&dyn SecondaryStore>,
) -> Result<WipeReport> {
    let start = Instant::now();
    let batch_size = batch_size.max(1);
    info!(
        subsystem = "wipe",
        op = "start",
        collections = %collections.join(", "),
        batch_size,
        "Collections to wipe"
    );

    let mut report = WipeReport {
        collections: Vec::with_capacity(collections.len()),
        secondary: SecondaryOutcome::NotConfigured,
    };

    for collection in collections {
        let mut entry = CollectionWipe {
            collection: collection.clone(),
            deleted: 0,
            batches: 0,
            skipped: false,
        };

        if !target.has_collection(collection).await? {
            warn!(subsystem = "wipe", collection = %collection, "Collection not found, skipping");
            entry.skipped = true;
            report.collections.push(entry);
            continue;
        }

        loop {
            let deleted = target.delete_batch(collection, batch_size).await?;
            if deleted == 0 {
                break;
            }
            entry.deleted += deleted;
            entry.batches += 1;
            info!(
                subsystem = "wipe",
                collection = %collection,
                result_count = entry.deleted,
                "Deleted rows so far"
            );
        }
        info!(subsystem = "wipe", collection = %collection, result_count = entry.deleted, "Collection done");
        report.collections.push(entry);
    }

    report.secondary = match secondary {
        None => {
            warn!(subsystem = "wipe", "No secondary store configured, skipping clear");
            SecondaryOutcome::NotConfigured
        }
        Some(store) => {
            info!(subsystem = "wipe", store = %store.describe(), "Clearing secondary store root");
            match store.clear_root().await {
                Ok(()) => SecondaryOutcome::Cleared,
                Err(e) => {
                    warn!(
                        subsystem = "wipe",
                        store = %store.describe(),
                        error = %e,
                        "Skipping secondary store clear"
                    );
                    SecondaryOutcome::Skipped(e.to_string())
                }
            }
        }
    };

    info!(
        subsystem = "wipe",
        op = "finish",
        result_count = report.total_deleted(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Wipe finished; blob storage was not modified"
    );
    Ok(report)
}

// =============================================================================
// POSTGRES TARGET
// =============================================================================

/// Wipes PostgreSQL tables.
pub struct PgWipeTarget {
    pool: PgPool,
}

impl PgWipeTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WipeTarget for PgWipeTarget {
    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let table = table_for_collection(collection)?;
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&table)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete_batch(&self, collection: &str, limit: i64) -> Result<u64> {
        let table = table_for_collection(collection)?;
        // Identifier validated above; tables cannot be bound as parameters.
        let sql = format!(
            "DELETE FROM {table} WHERE ctid IN (SELECT ctid FROM {table} LIMIT $1)"
        );
        let result = sqlx::query(&sql).bind(limit).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b2b_core::Error;
    use std::sync::Mutex;

    /// Table with a fixed number of rows per collection.
    struct CountingTarget {
        rows: Mutex<Vec<(String, u64)>>,
        calls: Mutex<Vec<i64>>,
    }

    impl CountingTarget {
        fn new(rows: &[(&str, u64)]) -> Self {
            Self {
                rows: Mutex::new(rows.iter().map(|(n, c)| (n.to_string(), *c)).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WipeTarget for CountingTarget {
        async fn has_collection(&self, collection: &str) -> Result<bool> {
            Ok(self.rows.lock().unwrap().iter().any(|(n, _)| n == collection))
        }

        async fn delete_batch(&self, collection: &str, limit: i64) -> Result<u64> {
            self.calls.lock().unwrap().push(limit);
            let mut rows = self.rows.lock().unwrap();
            let entry = rows.iter_mut().find(|(n, _)| n == collection).unwrap();
            let taken = entry.1.min(limit as u64);
            entry.1 -= taken;
            Ok(taken)
        }
    }

    struct MissingSecondary;

    #[async_trait]
    impl SecondaryStore for MissingSecondary {
        fn describe(&self) -> String {
            "missing".into()
        }

        async fn clear_root(&self) -> Result<()> {
            Err(Error::NotFound("not provisioned".into()))
        }
    }

    #[test]
    fn test_parse_collections() {
        assert_eq!(
            parse_collections(" people, products ,,projects,people "),
            vec!["people", "products", "projects"]
        );
        assert!(parse_collections(" , ").is_empty());
    }

    #[test]
    fn test_table_for_collection() {
        assert_eq!(table_for_collection("people").unwrap(), "customer");
        assert_eq!(table_for_collection("Projects").unwrap(), "project");
        assert_eq!(table_for_collection("products").unwrap(), "product");
        assert_eq!(table_for_collection("invoices").unwrap(), "invoices");
        assert!(table_for_collection("people; drop").is_err());
    }

    #[tokio::test]
    async fn test_wipe_runs_batches_until_empty() {
        let target = CountingTarget::new(&[("people", 450), ("projects", 0)]);
        let collections = parse_collections("people,projects,ghosts");
        let report = wipe(&target, &collections, 200, None).await.unwrap();

        assert_eq!(report.collections[0].deleted, 450);
        assert_eq!(report.collections[0].batches, 3);
        assert_eq!(report.collections[1].deleted, 0);
        assert!(!report.collections[1].skipped);
        assert!(report.collections[2].skipped);
        assert_eq!(report.total_deleted(), 450);
        assert_eq!(report.secondary, SecondaryOutcome::NotConfigured);
        assert!(target.calls.lock().unwrap().iter().all(|l| *l == 200));
    }

    #[tokio::test]
    async fn test_missing_secondary_store_is_not_fatal() {
        let target = CountingTarget::new(&[("people", 1)]);
        let report = wipe(
            &target,
            &["people".to_string()],
            200,
            Some(&MissingSecondary),
        )
        .await
        .unwrap();
        assert!(matches!(report.secondary, SecondaryOutcome::Skipped(_)));
        assert_eq!(report.total_deleted(), 1);
    }
}
