//! PostgreSQL-backed dropdown option catalog.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::trace;

use arms_core::{FieldOption, OptionCatalog, Result};

/// Option catalog reading active options from `arms_field_option`.
#[derive(Clone)]
pub struct PgOptionCatalog {
    pool: PgPool,
}

impl PgOptionCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or rename an option.
    pub async fn upsert(&self, catalog: &str, option: &FieldOption, active: bool) -> Result<()> {
        sqlx::query(
            "INSERT INTO arms_field_option (catalog, id, name, active)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (catalog, id) DO UPDATE SET name = EXCLUDED.name, active = EXCLUDED.active",
        )
        .bind(catalog)
        .bind(option.id)
        .bind(&option.name)
        .bind(active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OptionCatalog for PgOptionCatalog {
    async fn options(&self, key: &str) -> Result<Vec<FieldOption>> {
        let rows = sqlx::query(
            "SELECT id, name FROM arms_field_option
             WHERE catalog = $1 AND active
             ORDER BY sort_order, id",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        let options = rows
            .iter()
            .map(|row| {
                Ok(FieldOption {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        trace!(subsystem = "db", op = "options", catalog = key, count = options.len(), "Loaded options");
        Ok(options)
    }
}
