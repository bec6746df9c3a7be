//! # b2b-db
//!
//! Storage layer for bid2build.
//!
//! This crate provides:
//! - Connection pool management
//! - Customer stores: PostgreSQL, in-memory, and a local persisted snapshot
//! - Live owner-scoped subscriptions over any store
//! - Blob storage backends (filesystem, HTTP object store)
//! - The administrative data wipe behind the `b2b-wipe` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use b2b_db::{Database, CustomerStore, OwnerId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/bid2build").await?;
//!     let owner = OwnerId::new("uid-123")?;
//!
//!     for customer in db.customers.list(&owner).await? {
//!         println!("{} {}", customer.id, customer.fields.display_name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod customers;
pub mod file_storage;
pub mod identifiers;
pub mod live;
pub mod local_cache;
pub mod memory;
pub mod pool;
pub mod wipe;

// Re-export core types
pub use b2b_core::*;

pub use customers::{ChangeNotice, PgChangeListener, PgCustomerStore};
pub use file_storage::{
    FilesystemBackend, HttpBackend, MemoryBackend, ObjectBlobStore, StorageBackend,
};
pub use identifiers::validate_identifier;
pub use live::{subscribe, CustomerFeed, CustomerSet};
pub use local_cache::SnapshotFile;
pub use memory::MemoryCustomerStore;
pub use pool::{create_pool, create_pool_with_config, redact_url, PoolConfig};
pub use wipe::{
    parse_collections, table_for_collection, wipe, CollectionWipe, PgWipeTarget,
    SecondaryOutcome, SecondaryStore, WipeReport, WipeTarget,
};

/// Combined database handle.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub customers: std::sync::Arc<PgCustomerStore>,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_max_pictures(pool, defaults::MAX_PICTURES)
    }

    pub fn with_max_pictures(pool: sqlx::Pool<sqlx::Postgres>, max_pictures: usize) -> Self {
        Self {
            customers: std::sync::Arc::new(PgCustomerStore::with_max_pictures(
                pool.clone(),
                max_pictures,
            )),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Wipe target over this database's tables.
    pub fn wipe_target(&self) -> PgWipeTarget {
        PgWipeTarget::new(self.pool.clone())
    }
}
