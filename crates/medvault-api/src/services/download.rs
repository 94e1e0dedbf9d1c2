//! Download resolution
//!
//! Remote documents are served by redirecting to their durable URL. Local documents are
//! read only when their stored path sits under one of the configured prefixes and has no
//! parent-directory segment; anything else answers "not found" so a stored path can never
//! reach an arbitrary file.

use std::path::{Component, Path};
use std::sync::Arc;

use medvault_core::models::DocumentRecord;
use medvault_core::{AppError, ErrorMetadata};
use medvault_db::DocumentRepository;
use medvault_storage::{StorageError, StorageManager};
use uuid::Uuid;

use crate::auth::UserContext;
use crate::error::storage_error_to_app_error;
use crate::middleware::{AuditOrigin, AuditRecord, AuditSink};
use crate::state::AppState;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug)]
pub enum DownloadTarget {
    Redirect(String),
    File {
        name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

/// Whether a local stored path may be served.
pub fn is_allowed_path(physical_path: &str, allowed_prefixes: &[String]) -> bool {
    let path = Path::new(physical_path);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return false;
    }
    // Component-wise, so `/srv/uploads` does not admit `/srv/uploads-old`.
    allowed_prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .any(|prefix| path.starts_with(Path::new(prefix.as_str())))
}

fn file_not_found() -> AppError {
    AppError::NotFound("Document file not found".to_string())
}

pub struct DownloadService {
    documents: Arc<dyn DocumentRepository>,
    storage: StorageManager,
    audit: Arc<dyn AuditSink>,
    allowed_prefixes: Vec<String>,
}

impl DownloadService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        storage: StorageManager,
        audit: Arc<dyn AuditSink>,
        allowed_prefixes: Vec<String>,
    ) -> Self {
        Self {
            documents,
            storage,
            audit,
            allowed_prefixes,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.documents.clone(),
            state.storage.clone(),
            state.audit.clone(),
            state.download.allowed_prefixes.clone(),
        )
    }

    /// Resolve a document for download. Exactly one audit record is written per call.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.user_id, document_id = %id))]
    pub async fn download(&self, user: &UserContext, id: Uuid) -> Result<DownloadTarget, AppError> {
        let record = match self.documents.get(id).await {
            Ok(Some(record)) if user.can_access(record.user_id) => record,
            Ok(Some(record)) => {
                let e = AppError::Forbidden(format!("Document {} belongs to another user", id));
                self.audit_failure(user, Some(&record), &e).await;
                return Err(e);
            }
            Ok(None) => {
                let e = AppError::NotFound("Document not found".to_string());
                self.audit_failure(user, None, &e).await;
                return Err(e);
            }
            Err(e) => {
                self.audit_failure(user, None, &e).await;
                return Err(e);
            }
        };

        match self.target_for(&record).await {
            Ok(target) => {
                self.audit
                    .record(AuditRecord::success(
                        user.user_id,
                        AuditOrigin::Download,
                        record.id,
                        &record.name,
                        record.file_hash.clone(),
                    ))
                    .await;
                Ok(target)
            }
            Err(e) => {
                self.audit_failure(user, Some(&record), &e).await;
                Err(e)
            }
        }
    }

    async fn target_for(&self, record: &DocumentRecord) -> Result<DownloadTarget, AppError> {
        if record.is_remote() {
            return Ok(DownloadTarget::Redirect(record.physical_path.clone()));
        }

        if !is_allowed_path(&record.physical_path, &self.allowed_prefixes) {
            tracing::warn!(
                document_id = %record.id,
                "Stored path is outside the allowed download prefixes"
            );
            return Err(file_not_found());
        }

        let bytes = self
            .storage
            .read(&record.physical_path)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) | StorageError::InvalidKey(_) => file_not_found(),
                other => storage_error_to_app_error(other),
            })?;

        let mime_type = self
            .storage
            .get_metadata(&record.storage_file_id())
            .await
            .map(|metadata| metadata.mime_type)
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

        Ok(DownloadTarget::File {
            name: record.name.clone(),
            mime_type,
            bytes,
        })
    }

    async fn audit_failure(&self, user: &UserContext, record: Option<&DocumentRecord>, error: &AppError) {
        self.audit
            .record(AuditRecord::failure(
                user.user_id,
                AuditOrigin::Download,
                record.map(|r| r.id),
                record.map(|r| r.name.clone()).unwrap_or_default(),
                error.client_message(),
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["/var/lib/medvault/uploads".to_string()]
    }

    #[test]
    fn test_path_under_prefix_is_allowed() {
        assert!(is_allowed_path(
            "/var/lib/medvault/uploads/3f1c/3f1c-scan.pdf",
            &prefixes()
        ));
    }

    #[test]
    fn test_path_outside_prefix_is_refused() {
        assert!(!is_allowed_path("/etc/passwd", &prefixes()));
        assert!(!is_allowed_path("uploads/scan.pdf", &prefixes()));
    }

    #[test]
    fn test_parent_segments_are_refused_even_under_prefix() {
        assert!(!is_allowed_path(
            "/var/lib/medvault/uploads/../../../etc/passwd",
            &prefixes()
        ));
    }

    #[test]
    fn test_sibling_directory_sharing_the_prefix_is_refused() {
        let prefixes = vec!["/srv/uploads".to_string()];
        assert!(!is_allowed_path("/srv/uploads-old/x.pdf", &prefixes));
        assert!(is_allowed_path("/srv/uploads/x.pdf", &prefixes));
        assert!(is_allowed_path(
            "/srv/uploads/x.pdf",
            &["/srv/uploads/".to_string()]
        ));
    }

    #[test]
    fn test_double_dot_inside_a_file_name_is_allowed() {
        assert!(is_allowed_path(
            "/var/lib/medvault/uploads/3f1c/3f1c-report..final.pdf",
            &prefixes()
        ));
    }

    #[test]
    fn test_empty_prefix_never_matches() {
        assert!(!is_allowed_path("/anything", &[String::new()]));
    }
}
