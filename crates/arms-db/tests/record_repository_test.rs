//! PostgreSQL record repository tests.
//!
//! Require a migrated database at `DATABASE_URL`; run with `--ignored`.

use arms_db::test_fixtures::connect_test_database;
use arms_db::{FieldOption, OptionCatalog, RecordKind, RecordPayload, RecordSink};
use serde_json::json;

async fn database() -> arms_db::Result<arms_db::Database> {
    dotenvy::dotenv().ok();
    connect_test_database().await
}

fn payload(title: &str) -> RecordPayload {
    let mut map = RecordPayload::new();
    map.insert("title".into(), json!(title));
    map.insert("Image".into(), json!("upload/Events/9_1.pdf"));
    map
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_insert_then_update_record() {
    let db = database().await.expect("connect");
    let owner_id = chrono::Utc::now().timestamp_micros();

    let created = db
        .records
        .write(RecordKind::Event, owner_id, None, payload("Workshop"))
        .await
        .expect("insert");
    let updated = db
        .records
        .write(RecordKind::Event, owner_id, Some(created.id), payload("Workshop II"))
        .await
        .expect("update");
    assert_eq!(updated.id, created.id);

    let fetched = db.records.get(created.id).await.expect("get");
    assert_eq!(fetched.payload["title"], json!("Workshop II"));
    assert_eq!(fetched.kind, RecordKind::Event);

    let listed = db
        .records
        .list_by_owner(owner_id, RecordKind::Event)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_update_wrong_owner_is_not_found() {
    let db = database().await.expect("connect");
    let owner_id = chrono::Utc::now().timestamp_micros();
    let created = db
        .records
        .write(RecordKind::Award, owner_id, None, payload("Medal"))
        .await
        .expect("insert");

    let err = db
        .records
        .write(RecordKind::Award, owner_id + 1, Some(created.id), payload("Stolen"))
        .await
        .unwrap_err();
    assert!(matches!(err, arms_db::Error::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_inactive_options_are_hidden() {
    let db = database().await.expect("connect");
    let catalog = format!("test_level_{}", chrono::Utc::now().timestamp_micros());
    db.options
        .upsert(&catalog, &FieldOption::new(1, "National"), true)
        .await
        .unwrap();
    db.options
        .upsert(&catalog, &FieldOption::new(2, "Retired"), false)
        .await
        .unwrap();

    let options = db.options.options(&catalog).await.unwrap();
    assert_eq!(options, vec![FieldOption::new(1, "National")]);
}
