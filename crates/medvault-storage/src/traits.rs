//! Storage abstraction trait
//!
//! This module defines the [`StorageProvider`] trait that all storage backends implement,
//! together with the option and result types that cross it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use medvault_core::models::Slot;
use medvault_core::{DocumentContent, ProviderKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::UploadPolicy;

/// Storage operation errors outside of uploads
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file identifier: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Why an upload was refused. Always a value, never a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadFailure {
    #[error("File is {size} bytes; this storage accepts at most {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("File type '{mime_type}' is not accepted (allowed: {})", .allowed.join(", "))]
    UnsupportedType {
        mime_type: String,
        allowed: Vec<String>,
    },

    #[error("Invalid file content: {0}")]
    InvalidContent(String),

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Everything a provider needs to know about a file besides its bytes.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub file_name: String,
    pub mime_type: String,
    pub event_id: Option<Uuid>,
    pub slot: Option<Slot>,
    pub expiry_date: Option<NaiveDate>,
    /// Use this id instead of generating one, so callers can line it up with a record id.
    pub file_id: Option<Uuid>,
}

impl UploadOptions {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn with_file_id(mut self, file_id: Uuid) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn with_expiry(mut self, expiry_date: Option<NaiveDate>) -> Self {
        self.expiry_date = expiry_date;
        self
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Provider-level identifier, used for `get_url`, `delete` and `get_metadata`.
    pub id: String,
    /// Externally fetchable locator.
    pub url: String,
    /// Backend-internal locator.
    pub physical_path: String,
    /// Hex SHA-256 of the stored bytes.
    pub file_hash: String,
    pub size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub physical_path: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub event_id: Option<Uuid>,
    pub slot: Option<Slot>,
    pub expiry_date: Option<NaiveDate>,
    pub file_hash: Option<String>,
}

/// Storage abstraction trait
///
/// Implemented by every backend. Callers never branch on the concrete type; the few
/// behavioural differences are surfaced through `kind`, `supports_large_files` and
/// `max_file_size`.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Validate and store a document.
    async fn upload(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure>;

    /// Externally fetchable URL for a file id.
    async fn get_url(&self, file_id: &str) -> StorageResult<String>;

    /// Remove a file. `false` when nothing was removed.
    async fn delete(&self, file_id: &str) -> bool;

    async fn get_metadata(&self, file_id: &str) -> Option<FileMetadata>;

    /// Read bytes held by this process. Remote providers answer `NotFound`.
    async fn read(&self, physical_path: &str) -> StorageResult<Vec<u8>>;

    fn supports_large_files(&self) -> bool;

    /// Effective per-file ceiling in bytes.
    fn max_file_size(&self) -> u64;

    fn kind(&self) -> ProviderKind;

    /// Size ceiling and allowlist this provider enforces on upload.
    fn policy(&self) -> &UploadPolicy;

    /// Run the upload checks without storing anything.
    fn check(&self, content: &DocumentContent, options: &UploadOptions) -> Result<(), UploadFailure> {
        self.policy().validate(content, options).map(|_| ())
    }
}
