//! Application state shared by every handler.
//!
//! Repositories are held as trait objects so the same router runs on PostgreSQL in
//! production and on the in-memory database in tests.

use std::sync::Arc;

use medvault_db::{
    DocumentRepository, EventRepository, NotificationRepository, ProfessionalRepository,
};
use medvault_storage::StorageManager;

use crate::middleware::AuditSink;

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentRepository>,
    pub events: Arc<dyn EventRepository>,
    pub professionals: Arc<dyn ProfessionalRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub storage: StorageManager,
    pub audit: Arc<dyn AuditSink>,
    pub download: DownloadConfig,
}

/// Where locally stored bytes may be served from.
#[derive(Clone, Debug)]
pub struct DownloadConfig {
    pub allowed_prefixes: Vec<String>,
}
