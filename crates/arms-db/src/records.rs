//! Record persistence: the backend write the lifecycle hands finalized
//! records to.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use arms_core::{Error, RecordKind, RecordPayload, RecordSink, Result, StoredRecord};

/// PostgreSQL record repository.
#[derive(Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: i64) -> Result<StoredRecord> {
        let row = sqlx::query("SELECT id, kind, owner_id, payload FROM arms_record WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {} not found", id)))?;
        record_from_row(&row)
    }

    /// List an owner's records of one kind, newest first.
    pub async fn list_by_owner(&self, owner_id: i64, kind: RecordKind) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            "SELECT id, kind, owner_id, payload FROM arms_record
             WHERE owner_id = $1 AND kind = $2
             ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl RecordSink for PgRecordRepository {
    async fn write(
        &self,
        kind: RecordKind,
        owner_id: i64,
        record_id: Option<i64>,
        payload: RecordPayload,
    ) -> Result<StoredRecord> {
        let id: i64 = match record_id {
            None => {
                sqlx::query_scalar(
                    "INSERT INTO arms_record (kind, owner_id, payload)
                     VALUES ($1, $2, $3)
                     RETURNING id",
                )
                .bind(kind.as_str())
                .bind(owner_id)
                .bind(Json(&payload))
                .fetch_one(&self.pool)
                .await?
            }
            Some(id) => sqlx::query_scalar(
                "UPDATE arms_record SET payload = $1, updated_at = now()
                 WHERE id = $2 AND owner_id = $3 AND kind = $4
                 RETURNING id",
            )
            .bind(Json(&payload))
            .bind(id)
            .bind(owner_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {} not found for owner {}", id, owner_id)))?,
        };

        info!(subsystem = "db", op = "write_record", record_id = id, owner_id, kind = %kind, "Record written");
        Ok(StoredRecord {
            id,
            kind,
            owner_id,
            payload,
        })
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<StoredRecord> {
    let kind: String = row.try_get("kind")?;
    let payload: Json<RecordPayload> = row.try_get("payload")?;
    Ok(StoredRecord {
        id: row.try_get("id")?,
        kind: kind.parse()?,
        owner_id: row.try_get("owner_id")?,
        payload: payload.0,
    })
}

/// In-memory record store for development and tests.
#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<MemoryRecords>>,
}

#[derive(Default)]
struct MemoryRecords {
    records: Vec<StoredRecord>,
    next_id: i64,
    writes: usize,
    fail_next: Option<String>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write fail with a database-style error.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_next = Some(message.into());
        }
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }

    pub fn get(&self, id: i64) -> Option<StoredRecord> {
        self.inner
            .lock()
            .ok()
            .and_then(|i| i.records.iter().find(|r| r.id == id).cloned())
    }

    pub fn all(&self) -> Vec<StoredRecord> {
        self.inner
            .lock()
            .map(|i| i.records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for InMemoryRecordStore {
    async fn write(
        &self,
        kind: RecordKind,
        owner_id: i64,
        record_id: Option<i64>,
        payload: RecordPayload,
    ) -> Result<StoredRecord> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::Internal("record store lock poisoned".to_string()))?;

        if let Some(message) = inner.fail_next.take() {
            return Err(Error::Internal(message));
        }

        let record = match record_id {
            None => {
                inner.next_id += 1;
                let record = StoredRecord {
                    id: inner.next_id,
                    kind,
                    owner_id,
                    payload,
                };
                inner.records.push(record.clone());
                record
            }
            Some(id) => {
                let existing = inner
                    .records
                    .iter_mut()
                    .find(|r| r.id == id && r.owner_id == owner_id && r.kind == kind)
                    .ok_or_else(|| {
                        Error::NotFound(format!("Record {} not found for owner {}", id, owner_id))
                    })?;
                existing.payload = payload;
                existing.clone()
            }
        };
        inner.writes += 1;
        Ok(record)
    }
}

impl InMemoryRecordStore {
    /// Seed an existing record, as if loaded from the backend.
    pub fn seed(&self, kind: RecordKind, owner_id: i64, payload: RecordPayload) -> StoredRecord {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.next_id += 1;
        let record = StoredRecord {
            id: inner.next_id,
            kind,
            owner_id,
            payload,
        };
        inner.records.push(record.clone());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(title: &str) -> RecordPayload {
        let mut map = RecordPayload::new();
        map.insert("title".into(), json!(title));
        map
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = InMemoryRecordStore::new();
        let a = store.write(RecordKind::Event, 5, None, payload("a")).await.unwrap();
        let b = store.write(RecordKind::Event, 5, None, payload("b")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_update_replaces_payload() {
        let store = InMemoryRecordStore::new();
        let seeded = store.seed(RecordKind::Award, 3, payload("old"));
        let updated = store
            .write(RecordKind::Award, 3, Some(seeded.id), payload("new"))
            .await
            .unwrap();
        assert_eq!(updated.id, seeded.id);
        assert_eq!(store.get(seeded.id).unwrap().payload["title"], json!("new"));
    }

    #[tokio::test]
    async fn test_update_other_owner_is_not_found() {
        let store = InMemoryRecordStore::new();
        let seeded = store.seed(RecordKind::Award, 3, payload("old"));
        let err = store
            .write(RecordKind::Award, 4, Some(seeded.id), payload("new"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fail_next_write_is_one_shot() {
        let store = InMemoryRecordStore::new();
        store.fail_next_write("db down");
        assert!(store.write(RecordKind::Event, 1, None, payload("a")).await.is_err());
        assert!(store.write(RecordKind::Event, 1, None, payload("a")).await.is_ok());
        assert_eq!(store.write_count(), 1);
    }
}
