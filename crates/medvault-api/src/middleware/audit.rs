//! Audit trail for document access and submission
//!
//! Every download and every submitted document produces exactly one [`AuditRecord`],
//! whether it succeeded or not. The default sink writes records as JSON on the `audit`
//! tracing target so they can be routed separately from application logs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What triggered the audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOrigin {
    Upload,
    Notification,
    Download,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub user_id: Uuid,
    pub document_id: Option<Uuid>,
    pub file_name: String,
    pub file_hash: Option<String>,
    pub origin: AuditOrigin,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn success(
        user_id: Uuid,
        origin: AuditOrigin,
        document_id: Uuid,
        file_name: impl Into<String>,
        file_hash: Option<String>,
    ) -> Self {
        Self {
            user_id,
            document_id: Some(document_id),
            file_name: file_name.into(),
            file_hash,
            origin,
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        user_id: Uuid,
        origin: AuditOrigin,
        document_id: Option<Uuid>,
        file_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            document_id,
            file_name: file_name.into(),
            file_hash: None,
            origin,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Emits records on the `audit` tracing target.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => {
                if record.success {
                    tracing::info!(target: "audit", event = %json, "Document audit");
                } else {
                    tracing::warn!(target: "audit", event = %json, "Document audit");
                }
            }
            Err(e) => {
                tracing::error!(target: "audit", error = %e, "Failed to serialize audit record");
            }
        }
    }
}

/// Keeps records in memory; lets tests assert on what was audited.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, record: AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
