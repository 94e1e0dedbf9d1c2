//! Event and professional deletion over HTTP.
//!
//! Run with: `cargo test -p medvault-api --test orphan_test`

mod helpers;

use helpers::{bearer, pdf_body, seed_event, seed_professional, setup_test_app, TestApp};
use serde_json::Value;
use uuid::Uuid;

async fn upload(app: &TestApp, user: Uuid, event_id: Uuid, slot: &str) -> String {
    let response = app
        .client()
        .post(&format!("/events/{}/documents", event_id))
        .add_header("Authorization", bearer(user))
        .json(&pdf_body(slot, &format!("{}.pdf", slot), b"%PDF-1.4 body"))
        .await;
    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    body["documents"][0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_deleting_event_keeps_documents_as_orphans() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = Uuid::new_v4();
    let professional = seed_professional(&app, user, "Dr. Okafor");
    let event = seed_event(&app, user, Some(professional.id));
    let document_id = upload(&app, user, event.id, "result").await;

    let response = client
        .delete(&format!("/events/{}", event.id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["orphaned"], 1);
    assert_eq!(body["deleted"], 0);

    let orphaned: Value = client
        .get("/documents/orphaned")
        .add_header("Authorization", bearer(user))
        .await
        .json();
    let documents = orphaned["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["id"], document_id);
    assert_eq!(documents[0]["isOrphaned"], true);
    assert!(documents[0]["eventId"].is_null());
    let reason = documents[0]["orphanedReason"].as_str().unwrap();
    assert!(reason.contains("Dr. Okafor"));
    assert!(reason.contains("Blood panel"));

    assert_eq!(app.stored_files().len(), 1);
    let download = client
        .get(&format!("/files/{}/download", document_id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(download.status_code(), 200);
}

#[tokio::test]
async fn test_deleting_event_with_files_removes_everything() {
    let app = setup_test_app().await;
    let user = Uuid::new_v4();
    let event = seed_event(&app, user, None);
    upload(&app, user, event.id, "invoice").await;
    upload(&app, user, event.id, "certificate").await;
    assert_eq!(app.stored_files().len(), 2);

    let response = app
        .client()
        .delete(&format!("/events/{}?deleteFiles=true", event.id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["deleted"], 2);

    assert!(app.db.documents().is_empty());
    assert!(app.stored_files().is_empty());
    assert!(!app.db.event_exists(event.id));
}

#[tokio::test]
async fn test_deleting_professional_preserves_documents_of_all_events() {
    let app = setup_test_app().await;
    let user = Uuid::new_v4();
    let professional = seed_professional(&app, user, "Dr. Lindqvist");
    let first = seed_event(&app, user, Some(professional.id));
    let second = seed_event(&app, user, Some(professional.id));
    upload(&app, user, first.id, "request").await;
    upload(&app, user, second.id, "authorization").await;

    let response = app
        .client()
        .delete(&format!("/professionals/{}", professional.id))
        .add_header("Authorization", bearer(user))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["events"], 2);
    assert_eq!(body["orphaned"], 2);
    assert_eq!(body["failed"], 0);

    assert!(!app.db.professional_exists(professional.id));
    assert!(!app.db.event_exists(first.id));
    let remaining = app.db.documents();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|d| d.is_orphaned && d.professional_id.is_none()));
    assert_eq!(app.stored_files().len(), 2);
}

#[tokio::test]
async fn test_deleting_someone_elses_professional_is_forbidden() {
    let app = setup_test_app().await;
    let professional = seed_professional(&app, Uuid::new_v4(), "Dr. Ruiz");

    let response = app
        .client()
        .delete(&format!("/professionals/{}", professional.id))
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 403);
    assert!(app.db.professional_exists(professional.id));
}
