//! Extraction, reconciliation and highlighting within a session.

use serde_json::json;

use super::{pdf, Harness};
use crate::{Error, NoticeLevel, ReconcileMode, SaveOptions};

#[tokio::test]
async fn test_enum_drift_clears_field_without_highlight() {
    let h = Harness::new();
    h.extractor
        .push_fields([("level", json!(999)), ("title", json!("AI Summit"))], 0.9);
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    let report = lc
        .run_extraction(ReconcileMode::Replace)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(lc.session().get("level"), Some(&json!(null)));
    assert!(!lc.is_auto_filled("level"));
    assert!(lc.is_auto_filled("title"));
    assert_eq!(report.cleared, vec!["level"]);
    assert_eq!(h.notices.drain().last().unwrap().message, "1 field updated");
}

#[tokio::test]
async fn test_reconciled_values_reach_backend() {
    let h = Harness::new();
    h.extractor.push_fields(
        [
            ("level", json!("national")),
            ("event_type", json!("11")),
            ("event_date", json!("01/03/2026")),
            ("participants", json!("1,200")),
        ],
        0.8,
    );
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();
    lc.run_extraction(ReconcileMode::Replace).await.unwrap();

    let saved = lc.save(SaveOptions::default()).await.unwrap();
    let payload = &saved.record.payload;
    assert_eq!(payload["level"], json!(2));
    assert_eq!(payload["event_type"], json!(11));
    assert_eq!(payload["event_date"], json!("2026-03-01"));
    assert_eq!(payload["participants"], json!(1200));
    assert!(lc.session().auto_filled().is_empty(), "save clears highlighting");
}

#[tokio::test]
async fn test_extracted_document_field_is_ignored() {
    let h = Harness::new();
    h.extractor
        .push_fields([("Image", json!("upload/Events/dummy.pdf"))], 1.0);
    let mut lc = h.add();
    let staged = lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    let report = lc
        .run_extraction(ReconcileMode::Replace)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.skipped, vec!["Image"]);
    assert_eq!(lc.intent().current, staged);
}

#[tokio::test]
async fn test_fill_empty_only_keeps_user_values() {
    let h = Harness::new();
    h.extractor.push_fields(
        [("title", json!("Extracted title")), ("venue", json!("Hall B"))],
        0.9,
    );
    let mut lc = h.add();
    lc.set_field("title", json!("My title")).unwrap();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    lc.run_extraction(ReconcileMode::FillEmptyOnly)
        .await
        .unwrap();

    assert_eq!(lc.session().get("title"), Some(&json!("My title")));
    assert_eq!(lc.session().get("venue"), Some(&json!("Hall B")));
    assert!(!lc.is_auto_filled("title"));
    assert!(lc.is_auto_filled("venue"));
}

#[tokio::test]
async fn test_user_edit_and_touch_clear_highlight() {
    let h = Harness::new();
    h.extractor.push_fields(
        [("title", json!("AI Summit")), ("venue", json!("Hall B"))],
        0.9,
    );
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();
    lc.run_extraction(ReconcileMode::Replace).await.unwrap();

    lc.set_field("title", json!("AI Summit 2026")).unwrap();
    assert!(!lc.is_auto_filled("title"));

    assert!(lc.touch("venue"));
    assert!(!lc.is_auto_filled("venue"));
    assert_eq!(lc.session().get("venue"), Some(&json!("Hall B")));
}

#[tokio::test]
async fn test_extraction_failure_is_non_fatal() {
    let h = Harness::new();
    h.extractor.push_failure("model unavailable");
    let mut lc = h.add();
    lc.set_field("title", json!("Manual")).unwrap();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    let err = lc.run_extraction(ReconcileMode::Replace).await.unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert!(!err.is_fatal_to_save());

    let notice = h.notices.drain().pop().unwrap();
    assert_eq!(notice.level, NoticeLevel::Transient);
    assert_eq!(notice.message, "extraction failed, fill manually");

    let saved = lc.save(SaveOptions::document_required()).await.unwrap();
    assert_eq!(saved.record.payload["title"], json!("Manual"));
}

#[tokio::test]
async fn test_low_confidence_result_is_rejected() {
    let mut h = Harness::new();
    h.config = h.config.clone().with_min_confidence(0.8);
    h.extractor.push_fields([("title", json!("Guess"))], 0.4);
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    let err = lc.run_extraction(ReconcileMode::Replace).await.unwrap_err();

    assert!(matches!(err, Error::Extraction(_)));
    assert_eq!(lc.session().get("title"), None);
    assert!(lc.session().auto_filled().is_empty());
}

#[tokio::test]
async fn test_extraction_without_staged_document() {
    let h = Harness::new();
    let mut lc = h.add();

    let err = lc.run_extraction(ReconcileMode::Replace).await.unwrap_err();

    assert!(matches!(err, Error::Extraction(_)));
    assert_eq!(h.extractor.call_count(), 0);
}

#[tokio::test]
async fn test_result_after_cancel_is_discarded() {
    let h = Harness::new();
    h.extractor.push_fields([("title", json!("Late"))], 0.9);
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    let ticket = lc.begin_extraction().await.unwrap();
    lc.cancel();
    let result = ticket.run().await;
    let applied = lc
        .apply_extraction(ticket, result, ReconcileMode::Replace)
        .await
        .unwrap();

    assert!(applied.is_none());
    assert_eq!(lc.session().get("title"), None);
    assert!(!lc.is_auto_filled("title"));
}

#[tokio::test]
async fn test_result_for_replaced_file_is_discarded() {
    let h = Harness::new();
    h.extractor.push_fields([("title", json!("From first file"))], 0.9);
    let mut lc = h.add();
    lc.on_file_selected(pdf("first.pdf")).await.unwrap();

    let ticket = lc.begin_extraction().await.unwrap();
    assert_eq!(ticket.document().filename, "first.pdf");
    lc.on_file_selected(pdf("second.pdf")).await.unwrap();
    let result = ticket.run().await;
    let applied = lc
        .apply_extraction(ticket, result, ReconcileMode::Replace)
        .await
        .unwrap();

    assert!(applied.is_none());
    assert_eq!(lc.session().get("title"), None);
}

#[tokio::test]
async fn test_result_after_save_is_discarded() {
    let h = Harness::new();
    h.extractor.push_fields([("title", json!("Late"))], 0.9);
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();

    let ticket = lc.begin_extraction().await.unwrap();
    lc.save(SaveOptions::default()).await.unwrap();
    let result = ticket.run().await;
    let applied = lc
        .apply_extraction(ticket, result, ReconcileMode::Replace)
        .await
        .unwrap();

    assert!(applied.is_none());
    assert!(lc.session().auto_filled().is_empty());
}

#[tokio::test]
async fn test_cancel_clears_highlighting() {
    let h = Harness::new();
    h.extractor.push_fields([("title", json!("AI Summit"))], 0.9);
    let mut lc = h.add();
    lc.on_file_selected(pdf("brochure.pdf")).await.unwrap();
    lc.run_extraction(ReconcileMode::Replace).await.unwrap();
    assert!(lc.is_auto_filled("title"));

    lc.cancel();

    assert!(!lc.is_auto_filled("title"));
    assert_eq!(lc.session().get("title"), None);
}
