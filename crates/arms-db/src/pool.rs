//! Postgres pool for the record repository and option catalog.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use arms_core::{Error, Result};

/// Form saves are short single-row upserts, so a small pool suffices.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ARMS_DB_MAX_CONNECTIONS` | `5` | Upper bound on pooled connections |
    /// | `ARMS_DB_ACQUIRE_TIMEOUT_SECS` | `10` | Wait for a free connection before failing the save |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_number("ARMS_DB_MAX_CONNECTIONS") {
            config.max_connections = n.max(1) as u32;
        }
        if let Some(secs) = env_number("ARMS_DB_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self
    }

    /// Open a pool against `database_url`.
    pub async fn connect(&self, database_url: &str) -> Result<PgPool> {
        let start = Instant::now();
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            op = "connect",
            max_connections = self.max_connections,
            duration_ms = start.elapsed().as_millis() as u64,
            "Record database connected"
        );
        Ok(pool)
    }
}

fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring non-numeric value");
            None
        }
    }
}

/// Apply the `arms_record` / `arms_field_option` migrations.
#[cfg(feature = "migrations")]
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))
}
