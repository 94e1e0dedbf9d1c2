//! Download resolution over HTTP.
//!
//! Run with: `cargo test -p medvault-api --test download_test`

mod helpers;

use chrono::Utc;
use helpers::{bearer, pdf_body, seed_event, setup_test_app};
use medvault_api::middleware::AuditOrigin;
use medvault_core::models::{DocumentRecord, Slot};
use serde_json::Value;
use uuid::Uuid;

fn record(user_id: Uuid, physical_path: &str, url: &str) -> DocumentRecord {
    DocumentRecord {
        id: Uuid::new_v4(),
        user_id,
        slot: Slot::Result,
        event_id: None,
        professional_id: None,
        name: "scan.pdf".to_string(),
        url: url.to_string(),
        physical_path: physical_path.to_string(),
        file_hash: None,
        upload_date: None,
        expiry_date: None,
        is_orphaned: true,
        orphaned_reason: Some("Imported".to_string()),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_owner_downloads_stored_bytes() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    let bytes = b"%PDF-1.4 lab results";

    let created: Value = client
        .post(&format!("/events/{}/documents", event.id))
        .add_header("Authorization", bearer(user))
        .json(&pdf_body("result", "lab \"final\".pdf", bytes))
        .await
        .json();
    let url = created["documents"][0]["url"].as_str().unwrap().to_string();

    let response = client
        .get(&url)
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(&response.as_bytes()[..], &bytes[..]);
    assert_eq!(response.header("content-type"), "application/pdf");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"lab _final_.pdf\""
    );

    let downloads: Vec<_> = app
        .audit
        .records()
        .into_iter()
        .filter(|r| r.origin == AuditOrigin::Download)
        .collect();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].success);
}

#[tokio::test]
async fn test_path_outside_allowed_prefixes_is_404() {
    let app = setup_test_app().await;
    let user = Uuid::new_v4();
    let doc = record(user, "/etc/passwd", "/files/x/download");
    app.db.add_document(doc.clone());

    let response = app
        .client()
        .get(&format!("/files/{}/download", doc.id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 404);

    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_traversal_under_prefix_is_404() {
    let app = setup_test_app().await;
    let user = Uuid::new_v4();
    let path = format!("{}/../../etc/passwd", app.storage_root.display());
    let doc = record(user, &path, "/files/x/download");
    app.db.add_document(doc.clone());

    let response = app
        .client()
        .get(&format!("/files/{}/download", doc.id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_remote_document_redirects() {
    let app = setup_test_app().await;
    let user = Uuid::new_v4();
    let remote = "https://cdn.example.com/file/bucket/scan.pdf";
    let doc = record(user, remote, remote);
    app.db.add_document(doc.clone());

    let response = app
        .client()
        .get(&format!("/files/{}/download", doc.id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 307);
    assert_eq!(response.header("location"), remote);
}

#[tokio::test]
async fn test_other_users_document_is_forbidden_and_audited() {
    let app = setup_test_app().await;
    let owner = Uuid::new_v4();
    let doc = record(owner, "/etc/passwd", "/files/x/download");
    app.db.add_document(doc.clone());

    let response = app
        .client()
        .get(&format!("/files/{}/download", doc.id))
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 403);

    let records = app.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].document_id, Some(doc.id));
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_unknown_document_is_404() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .get(&format!("/files/{}/download", Uuid::new_v4()))
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 404);
}
