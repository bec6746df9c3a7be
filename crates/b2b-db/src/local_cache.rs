//! Local persisted fallback for customer records.
//!
//! A single JSON document holding one serialized array under the fixed
//! namespace key [`LOCAL_CACHE_NAMESPACE`]. It is read once when a store opens
//! and rewritten in full after every mutation. The format has no version
//! field and no migrations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use b2b_core::defaults::LOCAL_CACHE_NAMESPACE;
use b2b_core::{Customer, Error, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::wipe::SecondaryStore;

/// On-disk snapshot of every owner's records.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the namespaced array. A missing file is an empty snapshot.
    pub async fn load(&self) -> Result<Vec<Customer>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "local_cache: no snapshot yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut doc: BTreeMap<String, Vec<Customer>> = serde_json::from_slice(&raw)?;
        let records = doc.remove(LOCAL_CACHE_NAMESPACE).unwrap_or_default();
        info!(
            path = %self.path.display(),
            result_count = records.len(),
            "local_cache: snapshot loaded"
        );
        Ok(records)
    }

    /// Rewrite the whole snapshot atomically (temp file + rename).
    pub async fn save(&self, records: &[Customer]) -> Result<()> {
        let mut doc = BTreeMap::new();
        doc.insert(LOCAL_CACHE_NAMESPACE, records);
        let bytes = serde_json::to_vec(&doc)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            result_count = records.len(),
            size_bytes = bytes.len(),
            "local_cache: snapshot written"
        );
        Ok(())
    }
}

#[async_trait]
impl SecondaryStore for SnapshotFile {
    fn describe(&self) -> String {
        format!("local snapshot {}", self.path.display())
    }

    /// Reset the snapshot to an empty namespace. Fails when it was never created.
    async fn clear_root(&self) -> Result<()> {
        if !fs::try_exists(&self.path).await? {
            return Err(Error::NotFound(format!(
                "snapshot {} does not exist",
                self.path.display()
            )));
        }
        self.save(&[]).await
    }
}
