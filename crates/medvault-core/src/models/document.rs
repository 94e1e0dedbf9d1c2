use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use crate::constants::FILES_ROUTE_PREFIX;

/// Route the API serves locally stored bytes from: `/files/{id}/download`.
pub fn internal_download_path(id: Uuid) -> String {
    format!("{}/{}/download", FILES_ROUTE_PREFIX, id)
}

/// Named attachment position on a health event. At most one live document per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "document_slot", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Request,
    Authorization,
    Certificate,
    Result,
    Prescription,
    Invoice,
}

impl Slot {
    pub const ALL: [Slot; 6] = [
        Slot::Request,
        Slot::Authorization,
        Slot::Certificate,
        Slot::Result,
        Slot::Prescription,
        Slot::Invoice,
    ];

    /// Human label used in conflict warnings.
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Request => "Request",
            Slot::Authorization => "Authorization",
            Slot::Certificate => "Certificate",
            Slot::Result => "Result",
            Slot::Prescription => "Prescription",
            Slot::Invoice => "Invoice",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Request => "request",
            Slot::Authorization => "authorization",
            Slot::Certificate => "certificate",
            Slot::Result => "result",
            Slot::Prescription => "prescription",
            Slot::Invoice => "invoice",
        }
    }
}

impl FromStr for Slot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Slot::ALL
            .iter()
            .copied()
            .find(|slot| slot.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown document slot: {}", s))
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Persisted document metadata.
///
/// `physical_path` is the backend-internal locator and never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct DocumentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot: Slot,
    pub event_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    pub physical_path: String,
    pub file_hash: Option<String>,
    pub upload_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_orphaned: bool,
    pub orphaned_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A fresh orphaned record carrying this one's file, detached from every owner.
    ///
    /// An internal download URL is re-pointed at the copy's id; the original row does not
    /// outlive the cascade that follows.
    pub fn orphaned_copy(&self, reason: String) -> NewDocumentRecord {
        let id = Uuid::new_v4();
        NewDocumentRecord {
            id,
            user_id: self.user_id,
            slot: self.slot,
            event_id: None,
            professional_id: None,
            name: self.name.clone(),
            url: self.url.replace(
                &internal_download_path(self.id),
                &internal_download_path(id),
            ),
            physical_path: self.physical_path.clone(),
            file_hash: self.file_hash.clone(),
            upload_date: self.upload_date,
            expiry_date: self.expiry_date,
            is_orphaned: true,
            orphaned_reason: Some(reason),
        }
    }

    /// Whether the stored locator points at a remote backend rather than local disk.
    pub fn is_remote(&self) -> bool {
        self.physical_path.starts_with("https://") || self.physical_path.starts_with("http://")
    }

    /// Identifier to hand to the storage provider for this record's bytes.
    ///
    /// Remote files are addressed by URL. Local files are stored as `{file_id}-{name}`, so the
    /// id is recovered from the file name; orphaned copies share the original's file.
    pub fn storage_file_id(&self) -> String {
        if self.is_remote() {
            return self.physical_path.clone();
        }
        std::path::Path::new(&self.physical_path)
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.get(..36))
            .and_then(|prefix| Uuid::parse_str(prefix).ok())
            .unwrap_or(self.id)
            .to_string()
    }
}

/// Values for inserting a document record.
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot: Slot,
    pub event_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    pub physical_path: String,
    pub file_hash: Option<String>,
    pub upload_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_orphaned: bool,
    pub orphaned_reason: Option<String>,
}

impl NewDocumentRecord {
    pub fn into_record(self, created_at: DateTime<Utc>) -> DocumentRecord {
        DocumentRecord {
            id: self.id,
            user_id: self.user_id,
            slot: self.slot,
            event_id: self.event_id,
            professional_id: self.professional_id,
            name: self.name,
            url: self.url,
            physical_path: self.physical_path,
            file_hash: self.file_hash,
            upload_date: self.upload_date,
            expiry_date: self.expiry_date,
            is_orphaned: self.is_orphaned,
            orphaned_reason: self.orphaned_reason,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub slot: Slot,
    pub event_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    pub upload_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_orphaned: bool,
    pub orphaned_reason: Option<String>,
    pub file_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(doc: DocumentRecord) -> Self {
        DocumentResponse {
            id: doc.id,
            slot: doc.slot,
            event_id: doc.event_id,
            professional_id: doc.professional_id,
            name: doc.name,
            url: doc.url,
            upload_date: doc.upload_date,
            expiry_date: doc.expiry_date,
            is_orphaned: doc.is_orphaned,
            orphaned_reason: doc.orphaned_reason,
            file_hash: doc.file_hash,
            created_at: doc.created_at,
        }
    }
}
