//! Test helpers: build the router over the in-memory database and a temp-dir local
//! provider, so the HTTP surface can be exercised without Docker.
//!
//! Run with: `cargo test -p medvault-api`

#![allow(dead_code)]

use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use medvault_api::auth::{create_token, AuthState, UserRole};
use medvault_api::middleware::RecordingAuditSink;
use medvault_api::setup::routes::build_router;
use medvault_api::state::{AppState, DownloadConfig};
use medvault_core::models::{EventType, HealthEvent, Notification, Professional};
use medvault_core::StorageConfig;
use medvault_db::InMemoryDatabase;
use medvault_storage::StorageManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

pub struct TestApp {
    pub server: TestServer,
    pub db: InMemoryDatabase,
    pub audit: RecordingAuditSink,
    pub storage_root: std::path::PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Document files under the storage root, metadata sidecars excluded, sorted.
    pub fn stored_files(&self) -> Vec<std::path::PathBuf> {
        fn walk(dir: &std::path::Path, out: &mut Vec<std::path::PathBuf>) {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        if path.file_name().is_some_and(|n| n != ".meta") {
                            walk(&path, out);
                        }
                    } else {
                        out.push(path);
                    }
                }
            }
        }
        let mut files = Vec::new();
        walk(&self.storage_root, &mut files);
        files.sort();
        files
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage_root = temp_dir.path().to_path_buf();
    let storage_config = StorageConfig::local(&storage_root);
    let storage = StorageManager::from_config(&storage_config)
        .await
        .expect("Failed to create storage");

    let db = InMemoryDatabase::new();
    let audit = RecordingAuditSink::new();

    let state = Arc::new(AppState {
        documents: Arc::new(db.clone()),
        events: Arc::new(db.clone()),
        professionals: Arc::new(db.clone()),
        notifications: Arc::new(db.clone()),
        storage,
        audit: Arc::new(audit.clone()),
        download: DownloadConfig {
            allowed_prefixes: storage_config.download_allowed_prefixes.clone(),
        },
    });

    let app = build_router(state, AuthState::new(TEST_JWT_SECRET), &["*".to_string()])
        .expect("Failed to build router");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        db,
        audit,
        storage_root,
        _temp_dir: temp_dir,
    }
}

pub fn bearer(user_id: Uuid) -> String {
    let token = create_token(TEST_JWT_SECRET, user_id, UserRole::Patient, 3600)
        .expect("Failed to sign token");
    format!("Bearer {}", token)
}

pub fn seed_professional(app: &TestApp, user_id: Uuid, name: &str) -> Professional {
    let professional = Professional {
        id: Uuid::new_v4(),
        user_id,
        name: name.to_string(),
        specialty: Some("General practice".to_string()),
    };
    app.db.add_professional(professional.clone());
    professional
}

pub fn seed_event(app: &TestApp, user_id: Uuid, professional_id: Option<Uuid>) -> HealthEvent {
    let event = HealthEvent {
        id: Uuid::new_v4(),
        user_id,
        professional_id,
        event_type: EventType::Examination,
        title: "Blood panel".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid date"),
    };
    app.db.add_event(event.clone());
    event
}

pub fn seed_notification(app: &TestApp, user_id: Uuid, event_id: Uuid) -> Notification {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        event_id: Some(event_id),
        title: "Upload your results".to_string(),
        archived: false,
        created_at: Utc::now(),
    };
    app.db.add_notification(notification.clone());
    notification
}

/// Request body proposing one PDF for `slot`.
pub fn pdf_body(slot: &str, name: &str, bytes: &[u8]) -> Value {
    json!({
        "documents": {
            slot: {
                "name": name,
                "mimeType": "application/pdf",
                "content": STANDARD.encode(bytes),
            }
        }
    })
}
