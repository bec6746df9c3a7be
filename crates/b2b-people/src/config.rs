//! Runtime configuration read from the environment.
//!
//! Environment variables:
//!   B2B_MAX_PICTURES         - pictures per customer (default: 5)
//!   B2B_MAX_FILE_BYTES       - per-file upload cap (default: 1 MiB)
//!   B2B_MAX_SELECTION_BYTES  - cap on one submit's selection (default: 5 MiB)
//!   B2B_BLOB_BASE_URL        - public base URL uploads resolve under
//!   FILE_STORAGE_PATH        - filesystem blob root
//!   DATABASE_URL             - PostgreSQL store (optional)
//!   DB_MAX_CONNECTIONS       - pool size when DATABASE_URL is set
//!   DB_ACQUIRE_TIMEOUT_SECS  - pool acquire timeout
//!   B2B_LOCAL_CACHE          - local snapshot file (optional)

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use b2b_core::{defaults, BlobStore, CustomerStore, Error, Result};
use b2b_db::{
    create_pool_with_config, FilesystemBackend, MemoryCustomerStore, ObjectBlobStore,
    PgCustomerStore, PoolConfig,
};
use tracing::info;

use crate::validation::UploadLimits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeopleConfig {
    pub limits: UploadLimits,
    pub blob_base_url: String,
    pub file_storage_path: PathBuf,
    /// PostgreSQL store; `None` falls back to the local snapshot.
    pub database_url: Option<String>,
    pub pool: PoolConfig,
    pub local_cache: Option<PathBuf>,
}

impl Default for PeopleConfig {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            blob_base_url: defaults::BLOB_BASE_URL.to_string(),
            file_storage_path: PathBuf::from(defaults::FILE_STORAGE_PATH),
            database_url: None,
            pool: PoolConfig::default(),
            local_cache: None,
        }
    }
}

impl PeopleConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base = Self::default();

        let limits = UploadLimits {
            max_pictures: parse_or(&get, "B2B_MAX_PICTURES", base.limits.max_pictures)?,
            max_file_bytes: parse_or(&get, "B2B_MAX_FILE_BYTES", base.limits.max_file_bytes)?,
            max_selection_bytes: parse_or(
                &get,
                "B2B_MAX_SELECTION_BYTES",
                base.limits.max_selection_bytes,
            )?,
        };
        if limits.max_file_bytes > limits.max_selection_bytes {
            return Err(Error::Config(format!(
                "B2B_MAX_FILE_BYTES ({}) exceeds B2B_MAX_SELECTION_BYTES ({})",
                limits.max_file_bytes, limits.max_selection_bytes
            )));
        }

        Ok(Self {
            limits,
            blob_base_url: get("B2B_BLOB_BASE_URL").unwrap_or(base.blob_base_url),
            file_storage_path: get("FILE_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(base.file_storage_path),
            database_url: get("DATABASE_URL"),
            pool: PoolConfig::from_lookup(&get)?,
            local_cache: get("B2B_LOCAL_CACHE").map(PathBuf::from),
        })
    }

    /// Open the record store: PostgreSQL when `database_url` is set, else
    /// the local snapshot when `local_cache` is set, else memory only.
    pub async fn open_store(&self) -> Result<Arc<dyn CustomerStore>> {
        let max_pictures = self.limits.max_pictures;
        if let Some(url) = &self.database_url {
            let pool = create_pool_with_config(url, self.pool.clone()).await?;
            info!(subsystem = "people", backend = "postgres", max_pictures, "Record store opened");
            return Ok(Arc::new(PgCustomerStore::with_max_pictures(pool, max_pictures)));
        }
        if let Some(path) = &self.local_cache {
            let store = MemoryCustomerStore::open_persistent(path, max_pictures).await?;
            info!(
                subsystem = "people",
                backend = "snapshot",
                path = %path.display(),
                max_pictures,
                "Record store opened"
            );
            return Ok(Arc::new(store));
        }
        info!(subsystem = "people", backend = "memory", max_pictures, "Record store opened");
        Ok(Arc::new(MemoryCustomerStore::with_max_pictures(max_pictures)))
    }

    /// Filesystem blob store rooted at `file_storage_path`, checked for
    /// write access before it is handed out.
    pub async fn open_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        let backend = FilesystemBackend::new(&self.file_storage_path);
        backend.validate().await.map_err(|e| {
            Error::Config(format!(
                "FILE_STORAGE_PATH {} is not writable: {e}",
                self.file_storage_path.display()
            ))
        })?;
        info!(
            subsystem = "people",
            path = %self.file_storage_path.display(),
            "File storage initialized"
        );
        Ok(Arc::new(ObjectBlobStore::new(backend, self.blob_base_url.clone())))
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw:?}"))),
    }
}
