//! Blob storage for customer pictures.
//!
//! [`ObjectBlobStore`] writes bytes through a [`StorageBackend`] and hands
//! back a public URL that stays resolvable after the session ends.
//!
//! ## Example
//!
//! ```rust,ignore
//! use b2b_db::file_storage::{FilesystemBackend, ObjectBlobStore};
//!
//! let backend = FilesystemBackend::new("/var/lib/bid2build/files");
//! backend.validate().await?;
//! let blobs = ObjectBlobStore::new(backend, "https://files.example.com");
//!
//! let path = BlobPath::for_customer(&owner, record_id, "porch.jpg");
//! let url = blobs.upload(&path, "image/jpeg", &bytes).await?;
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use b2b_core::{BlobPath, BlobStore, Error, Result};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path, replacing anything there.
    async fn write(&self, path: &str, content_type: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Missing data is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Reject absolute paths and parent traversal before touching the backend.
fn check_relative(path: &str) -> Result<()> {
    let p = Path::new(path);
    let ok = !path.is_empty()
        && p.components().all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(Error::InvalidInput(format!("invalid storage path: {path}")));
    }
    Ok(())
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Filesystem storage backend rooted at a base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        check_relative(path)?;
        Ok(self.base_path.join(path))
    }

    /// Write, read back and delete a check file.
    ///
    /// Run at startup so permission problems or a missing volume surface
    /// before the first upload does.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let check_dir = self.base_path.join(".health-check");
        let check_file = check_dir.join("check.bin");

        fs::create_dir_all(&check_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", check_dir, e))?;

        let data = b"bid2build-storage-check";
        fs::write(&check_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", check_file, e))?;

        let read_back = fs::read(&check_file)
            .await
            .map_err(|e| format!("read({:?}): {}", check_file, e))?;
        if read_back != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&check_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", check_file, e))?;
        let _ = fs::remove_dir(&check_dir).await;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, _content_type: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(blob_path = %path, full_path = %full_path.display(), size_bytes = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        let mut temp_name = full_path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "file_storage: File::create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        // rw-r--r--, never executable
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }
}

// =============================================================================
// HTTP OBJECT STORE
// =============================================================================

/// Object store reached over HTTP (`PUT`/`GET`/`DELETE`/`HEAD` on
/// `{base_url}/{path}`).
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, path: &str) -> Result<String> {
        check_relative(path)?;
        Ok(format!("{}/{}", self.base_url, path))
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl StorageBackend for HttpBackend {
    async fn write(&self, path: &str, content_type: &str, data: &[u8]) -> Result<()> {
        let url = self.url(path)?;
        debug!(blob_path = %path, size_bytes = data.len(), "http_storage: put");
        let response = self
            .request(reqwest::Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data.to_vec())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upload(format!("PUT {path} returned {status}")));
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path)?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("blob {path}"))),
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            status => Err(Error::Request(format!("GET {path} returned {status}"))),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(Error::Request(format!("DELETE {path} returned {status}"))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.url(path)?;
        let response = self.request(reqwest::Method::HEAD, url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::Request(format!("HEAD {path} returned {status}"))),
        }
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Backend that keeps blobs in a map, for tests and local runs.
#[derive(Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for a stored blob.
    pub async fn content_type(&self, path: &str) -> Option<String> {
        self.blobs.read().await.get(path).map(|(ct, _)| ct.clone())
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write(&self, path: &str, content_type: &str, data: &[u8]) -> Result<()> {
        check_relative(path)?;
        self.blobs
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), data.to_vec()));
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(path)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Error::NotFound(format!("blob {path}")))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// [`BlobStore`] that writes through a backend and returns
/// `{public_base_url}/{path}`.
pub struct ObjectBlobStore<B> {
    backend: B,
    public_base_url: String,
}

impl<B: StorageBackend> ObjectBlobStore<B> {
    pub fn new(backend: B, public_base_url: impl Into<String>) -> Self {
        Self {
            backend,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Public URL a path resolves to.
    pub fn url_for(&self, path: &BlobPath) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    /// Storage path for a URL previously returned by this store.
    pub fn path_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_base_url.as_str())?
            .strip_prefix('/')
    }
}

#[async_trait]
impl<B: StorageBackend> BlobStore for ObjectBlobStore<B> {
    async fn upload(&self, path: &BlobPath, content_type: &str, data: &[u8]) -> Result<String> {
        self.backend
            .write(path.as_str(), content_type, data)
            .await
            .map_err(|e| {
                warn!(blob_path = %path, error = %e, "Blob upload failed");
                match e {
                    Error::Upload(msg) => Error::Upload(msg),
                    other => Error::Upload(format!("{path}: {other}")),
                }
            })?;
        debug!(blob_path = %path, size_bytes = data.len(), content_type, "Blob uploaded");
        Ok(self.url_for(path))
    }
}
