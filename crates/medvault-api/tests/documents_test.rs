//! Slot reconciliation over HTTP.
//!
//! Run with: `cargo test -p medvault-api --test documents_test`

mod helpers;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use helpers::{bearer, pdf_body, seed_event, seed_notification, setup_test_app};
use medvault_api::middleware::AuditOrigin;
use medvault_core::hashing::hash_bytes;
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn test_occupied_slot_answers_409_until_overwrite_is_confirmed() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let path = format!("/events/{}/documents", event.id);

    let first = client
        .post(&path)
        .add_header("Authorization", bearer(user))
        .json(&pdf_body("result", "first.pdf", b"%PDF-1.4 first"))
        .await;
    assert_eq!(first.status_code(), 201);

    let stored_before = app.stored_files();
    let mut warnings = Vec::new();
    for _ in 0..2 {
        let again = client
            .post(&path)
            .add_header("Authorization", bearer(user))
            .add_header("x-target-slot", "result")
            .json(&pdf_body("result", "second.pdf", b"%PDF-1.4 second"))
            .await;
        assert_eq!(again.status_code(), 409);
        let body: Value = again.json();
        assert_eq!(body["slot"], "result");
        assert!(body["warning"].as_str().unwrap().contains("Result"));
        assert!(body.get("error").is_none());
        warnings.push(body["warning"].clone());
    }
    assert_eq!(warnings[0], warnings[1]);
    assert_eq!(app.stored_files(), stored_before);

    let listed: Value = client
        .get(&path)
        .add_header("Authorization", bearer(user))
        .await
        .json();
    assert_eq!(listed["documents"].as_array().unwrap().len(), 1);
    assert_eq!(listed["documents"][0]["name"], "first.pdf");

    let third = client
        .post(&path)
        .add_header("Authorization", bearer(user))
        .add_header("x-target-slot", "result")
        .add_header("x-overwrite-confirmed", "true")
        .json(&pdf_body("result", "second.pdf", b"%PDF-1.4 second"))
        .await;
    assert_eq!(third.status_code(), 201);

    let live = app.db.documents();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].name, "second.pdf");
    assert_eq!(app.stored_files().len(), 1);

    let records = app.audit.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records.iter().filter(|r| r.success).count(), 2);
}

#[tokio::test]
async fn test_stored_record_carries_content_hash_and_internal_url() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let bytes = b"%PDF-1.4 prescription";

    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .json(&pdf_body("prescription", "rx.pdf", bytes))
        .await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    let document = &body["documents"][0];
    let id = document["id"].as_str().unwrap();
    assert_eq!(document["fileHash"], hash_bytes(bytes));
    assert_eq!(document["url"], format!("/files/{}/download", id));
    assert_eq!(document["slot"], "prescription");
    assert!(document.get("physicalPath").is_none());
}

#[tokio::test]
async fn test_notification_is_archived_with_the_write() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let notification = seed_notification(&app, user, event.id);

    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .add_header("x-source-notification", notification.id.to_string())
        .json(&pdf_body("invoice", "invoice.pdf", b"%PDF-1.4 invoice"))
        .await;
    assert_eq!(response.status_code(), 201);
    assert!(app.db.notification(notification.id).unwrap().archived);
}

#[tokio::test]
async fn test_unknown_notification_is_404_and_nothing_is_stored() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);

    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .add_header("x-source-notification", Uuid::new_v4().to_string())
        .json(&pdf_body("invoice", "invoice.pdf", b"%PDF-1.4 invoice"))
        .await;
    assert_eq!(response.status_code(), 404);
    assert!(app.db.documents().is_empty());
    assert!(app.stored_files().is_empty());

    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].origin, AuditOrigin::Notification);
    assert_eq!(records[0].file_name, "invoice.pdf");
}

#[tokio::test]
async fn test_refused_document_leaves_no_partial_submission() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let notification = seed_notification(&app, user, event.id);

    let body = serde_json::json!({
        "documents": {
            "request": {
                "name": "request.pdf",
                "mimeType": "application/pdf",
                "content": STANDARD.encode(b"%PDF-1.4 request")
            },
            "result": {
                "name": "notes.txt",
                "mimeType": "text/plain",
                "content": "aGVsbG8="
            }
        }
    });
    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .add_header("x-source-notification", notification.id.to_string())
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 415);

    assert!(app.db.documents().is_empty());
    assert!(app.stored_files().is_empty());
    assert!(!app.db.notification(notification.id).unwrap().archived);
    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_unknown_slot_key_is_400_and_audited() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);

    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .json(&pdf_body("xray", "chest.pdf", b"%PDF-1.4 xray"))
        .await;
    assert_eq!(response.status_code(), 400);

    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].origin, AuditOrigin::Upload);
    assert_eq!(records[0].file_name, "chest.pdf");
}

#[tokio::test]
async fn test_bad_target_slot_header_and_malformed_body_are_audited() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let path = format!("/events/{}/documents", event.id);

    let bad_header = client
        .post(&path)
        .add_header("Authorization", bearer(user))
        .add_header("x-target-slot", "xray")
        .json(&pdf_body("result", "a.pdf", b"%PDF-1.4"))
        .await;
    assert_eq!(bad_header.status_code(), 400);

    let malformed = client
        .post(&path)
        .add_header("Authorization", bearer(user))
        .json(&serde_json::json!({ "documents": "nope" }))
        .await;
    assert_eq!(malformed.status_code(), 400);

    let records = app.audit.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.success));
}

#[tokio::test]
async fn test_record_delete_failure_keeps_bytes() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);

    let created: Value = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .json(&pdf_body("result", "a.pdf", b"%PDF-1.4 a"))
        .await
        .json();
    let id = created["documents"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(app.stored_files().len(), 1);

    app.db.set_fail_writes(true);
    let response = client
        .delete(&format!("/documents/{}", id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 500);
    assert_eq!(app.db.documents().len(), 1);
    assert_eq!(app.stored_files().len(), 1);

    app.db.set_fail_writes(false);
    let response = client
        .delete(&format!("/documents/{}", id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 204);
    assert!(app.db.documents().is_empty());
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_rejected_mime_type_is_415() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);

    let body = serde_json::json!({
        "documents": {
            "result": {
                "name": "notes.txt",
                "mimeType": "text/plain",
                "content": "aGVsbG8="
            }
        }
    });
    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 415);
    assert!(app.db.documents().is_empty());
}

#[tokio::test]
async fn test_file_over_the_provider_limit_gets_structured_413() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let oversized = vec![b'%'; 25 * 1024 * 1024];

    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .json(&pdf_body("result", "scan.pdf", &oversized))
        .await;
    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.stored_files().is_empty());
    assert_eq!(app.audit.records().len(), 1);
}

#[tokio::test]
async fn test_other_users_event_is_forbidden() {
    let app = setup_test_app().await;
    let client = app.client();
    let event = seed_event(&app, Uuid::new_v4(), None);

    let response = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .json(&pdf_body("result", "a.pdf", b"%PDF-1.4"))
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(app.audit.records().len(), 1);
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let app = setup_test_app().await;
    let event = seed_event(&app, Uuid::new_v4(), None);

    let response = app
        .client()
        .get(&format!("/events/{}/documents", event.id))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["storageProvider"], "local");
}
