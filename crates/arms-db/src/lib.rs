//! # arms-db
//!
//! Storage and persistence layer for the ARMS document lifecycle.
//!
//! This crate provides:
//! - The local staging area for freshly selected documents
//! - The durable object store that staged documents are promoted into
//! - PostgreSQL connection pool management and migrations
//! - The record repository and dropdown option catalog
//! - In-memory variants of each for development and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use arms_db::{Database, StorageConfig};
//!
//! let db = Database::connect("postgres://localhost/arms").await?;
//! let (staging, durable) = StorageConfig::from_env().build().await?;
//! ```

pub mod catalog;
pub mod config;
pub mod file_storage;
pub mod pool;
pub mod records;
pub mod staging;

pub mod test_fixtures;

// Re-export core types
pub use arms_core::*;

pub use catalog::PgOptionCatalog;
pub use config::{StorageBackendKind, StorageConfig};
pub use file_storage::{
    durable_key, FilesystemBackend, MemoryBackend, ObjectDurableStore, StorageBackend,
};
pub use pool::PoolConfig;
pub use records::{InMemoryRecordStore, PgRecordRepository};
pub use staging::{LocalStagingArea, MemoryStagingArea};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Record repository for finalized form records.
    pub records: PgRecordRepository,
    /// Dropdown option catalog.
    pub options: PgOptionCatalog,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            records: PgRecordRepository::new(pool.clone()),
            options: PgOptionCatalog::new(pool.clone()),
            pool,
        }
    }

    /// Connect with pool settings from the environment.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PoolConfig::from_env().connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        pool::migrate(&self.pool).await
    }
}
