//! Durable document storage with pluggable backends.
//!
//! This module provides the object store that staged documents are promoted
//! into at save time:
//! - `StorageBackend` abstracts raw byte storage (filesystem, in-memory)
//! - `ObjectDurableStore` implements the lifecycle's `DurableStore` contract
//!   on top of a backend, reading promoted bytes from the staging area
//! - Durable keys follow `upload/{category}/{owner}_{record}_{version}.{ext}`;
//!   every `put` mints a fresh version so an existing object is never overwritten
//!
//! ## Example
//!
//! ```rust,ignore
//! use arms_db::{FilesystemBackend, LocalStagingArea, ObjectDurableStore};
//!
//! let staging = Arc::new(LocalStagingArea::new("/var/arms/staging"));
//! let store = ObjectDurableStore::new(FilesystemBackend::new("/var/arms/objects"), staging);
//!
//! let path = store.put("/uploaded-document/0190..-brochure.pdf", &placement).await?;
//! assert!(path.starts_with("upload/"));
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use arms_core::defaults::{DURABLE_PREFIX, FALLBACK_EXTENSION};
use arms_core::{
    file_extension, new_v7, DeleteOutcome, DurableStore, Error, Placement, Result, StagingStore,
};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified key, replacing any existing object.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified key.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if data exists at the specified key.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Filesystem storage backend.
///
/// Keys map directly to relative paths under the base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(Error::InvalidInput(format!(
                "Storage key '{}' is not a relative path",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }

    /// Validate that the storage backend can write, read, and delete files.
    ///
    /// Performs a full round-trip at startup to catch permission errors and
    /// missing directories early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join(".health-check");
        let test_file = test_dir.join("probe.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"arms-storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(key)?;
        debug!(storage_key = %key, full_path = %full_path.display(), size = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
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

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(key)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object '{}' not found", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.full_path(key)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_path = self.full_path(key)?;
        Ok(fs::try_exists(full_path).await?)
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

/// In-memory storage backend for development and tests.
#[derive(Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn poisoned() -> Error {
        Error::Internal("memory backend lock poisoned".to_string())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Object '{}' not found", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        Ok(objects.contains_key(key))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Replace characters that would split or escape a key segment.
fn key_segment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Generate the durable key for a placement.
///
/// Key format: `upload/{category}/{owner_id}_{record_key}_{version}.{ext}`
///
/// Example: `upload/Events/5_1001_0190c3a1.pdf`
pub fn durable_key(placement: &Placement, version: &str, extension: Option<&str>) -> String {
    let ext = extension
        .map(key_segment)
        .filter(|e| e.as_str() != "_")
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!(
        "{}{}/{}_{}_{}.{}",
        DURABLE_PREFIX,
        key_segment(&placement.category),
        placement.owner_id,
        key_segment(&placement.record_key),
        key_segment(version),
        ext
    )
}

/// Durable store that promotes staged files into a storage backend.
pub struct ObjectDurableStore {
    backend: Box<dyn StorageBackend>,
    staging: Arc<dyn StagingStore>,
}

impl ObjectDurableStore {
    pub fn new(backend: impl StorageBackend + 'static, staging: Arc<dyn StagingStore>) -> Self {
        Self {
            backend: Box::new(backend),
            staging,
        }
    }

    /// Read a durable object back.
    pub async fn read(&self, durable_path: &str) -> Result<Vec<u8>> {
        self.backend.read(durable_path).await
    }
}

#[async_trait]
impl DurableStore for ObjectDurableStore {
    async fn put(&self, staged_path: &str, placement: &Placement) -> Result<String> {
        let staged = self
            .staging
            .read(staged_path)
            .await
            .map_err(|e| Error::Upload(format!("Staged document unavailable: {}", e)))?;

        // The superseded object stays readable until the record write succeeds.
        let version = new_v7().simple().to_string();
        let key = durable_key(placement, &version, staged.extension().as_deref());
        self.backend
            .write(&key, &staged.data)
            .await
            .map_err(|e| Error::Upload(format!("{} backend write failed: {}", self.backend.name(), e)))?;

        info!(
            subsystem = "storage",
            op = "put",
            backend = self.backend.name(),
            owner_id = placement.owner_id,
            category = %placement.category,
            document_path = %key,
            size_bytes = staged.size(),
            "Promoted staged document"
        );
        Ok(key)
    }

    async fn delete(&self, durable_path: &str) -> DeleteOutcome {
        match self.backend.delete(durable_path).await {
            Ok(()) => {
                debug!(subsystem = "storage", op = "delete", document_path = %durable_path, "Deleted durable object");
                DeleteOutcome::ok(format!("Deleted {}", durable_path))
            }
            Err(e) => {
                warn!(subsystem = "storage", op = "delete", document_path = %durable_path, error = %e, "Durable delete failed");
                DeleteOutcome::failed(e.to_string())
            }
        }
    }

    async fn exists(&self, durable_path: &str) -> bool {
        match self.backend.exists(durable_path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(subsystem = "storage", op = "exists", document_path = %durable_path, error = %e, "Existence probe failed");
                false
            }
        }
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}
