//! Storage configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use arms_core::defaults::{STAGING_ROOT, STORAGE_ROOT};
use arms_core::{DurableStore, Error, Result, StagingStore};

use crate::file_storage::{FilesystemBackend, MemoryBackend, ObjectDurableStore};
use crate::staging::{LocalStagingArea, MemoryStagingArea};

/// Which backend holds staged and durable documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendKind {
    #[default]
    Filesystem,
    Memory,
}

impl FromStr for StorageBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(Error::Config(format!("Unknown storage backend '{}'", other))),
        }
    }
}

/// Storage configuration for the staging area and the durable store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Root of the durable object tree.
    pub storage_root: PathBuf,
    /// Directory holding staged uploads.
    pub staging_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Filesystem,
            storage_root: PathBuf::from(STORAGE_ROOT),
            staging_root: PathBuf::from(STAGING_ROOT),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ARMS_STORAGE_BACKEND` | `filesystem` | `filesystem` or `memory` |
    /// | `ARMS_STORAGE_ROOT` | `./data/objects` | Durable object root |
    /// | `ARMS_STAGING_ROOT` | `./data/staging` | Staging directory |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ARMS_STORAGE_BACKEND") {
            match val.parse() {
                Ok(kind) => config.backend = kind,
                Err(_) => warn!(value = %val, "Invalid ARMS_STORAGE_BACKEND, using default"),
            }
        }
        if let Ok(val) = std::env::var("ARMS_STORAGE_ROOT") {
            config.storage_root = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ARMS_STAGING_ROOT") {
            config.staging_root = PathBuf::from(val);
        }
        config
    }

    pub fn memory() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            ..Self::default()
        }
    }

    /// Build the staging area and the durable store sharing it.
    pub async fn build(&self) -> Result<(Arc<dyn StagingStore>, Arc<dyn DurableStore>)> {
        match self.backend {
            StorageBackendKind::Memory => {
                let staging: Arc<dyn StagingStore> = Arc::new(MemoryStagingArea::new());
                let durable = ObjectDurableStore::new(MemoryBackend::new(), staging.clone());
                info!(subsystem = "storage", backend = "memory", "Storage initialized");
                Ok((staging, Arc::new(durable)))
            }
            StorageBackendKind::Filesystem => {
                let backend = FilesystemBackend::new(&self.storage_root);
                backend.validate().await.map_err(Error::Config)?;
                let staging: Arc<dyn StagingStore> =
                    Arc::new(LocalStagingArea::new(&self.staging_root));
                let durable = ObjectDurableStore::new(backend, staging.clone());
                info!(
                    subsystem = "storage",
                    backend = "filesystem",
                    storage_root = %self.storage_root.display(),
                    staging_root = %self.staging_root.display(),
                    "Storage initialized"
                );
                Ok((staging, Arc::new(durable)))
            }
        }
    }
}
