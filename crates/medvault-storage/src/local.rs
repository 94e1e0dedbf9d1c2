//! Local filesystem provider
//!
//! Bytes are written to `{root}/{event_id}/{file_id}-{name}` (flat under `{root}` without an
//! event). A JSON sidecar at `{root}/.meta/{file_id}.json` maps the id back to the path so
//! `delete` and `get_metadata` never have to scan directories.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use medvault_core::hashing::hash_bytes;
use medvault_core::models::internal_download_path;
use medvault_core::{DocumentContent, ProviderKind};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::keys::stored_file_name;
use crate::traits::{
    FileMetadata, StorageError, StorageProvider, StorageResult, StoredFile, UploadFailure,
    UploadOptions,
};
use crate::validation::UploadPolicy;

const META_DIR: &str = ".meta";

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalProvider {
    root: PathBuf,
    public_base_url: Option<String>,
    policy: UploadPolicy,
}

impl LocalProvider {
    /// Create the provider, making sure the root and sidecar directories exist.
    pub async fn new(
        root: impl Into<PathBuf>,
        public_base_url: Option<String>,
        policy: UploadPolicy,
    ) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(root.join(META_DIR)).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalProvider {
            root,
            public_base_url,
            policy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, file_id: Uuid) -> String {
        let path = internal_download_path(file_id);
        match &self.public_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path,
        }
    }

    /// Sidecar location for an id. Only well-formed UUIDs are accepted, so an id can never
    /// address anything outside the metadata directory.
    fn sidecar_path(&self, file_id: &str) -> StorageResult<PathBuf> {
        let id = Uuid::parse_str(file_id)
            .map_err(|_| StorageError::InvalidKey(format!("not a file id: {}", file_id)))?;
        Ok(self.root.join(META_DIR).join(format!("{}.json", id)))
    }

    /// Resolve a stored path, refusing anything that escapes the storage root.
    fn checked_path(&self, physical_path: &str) -> StorageResult<PathBuf> {
        if physical_path.contains("..") {
            return Err(StorageError::InvalidKey(
                "Path contains a parent directory reference".to_string(),
            ));
        }

        let path = PathBuf::from(physical_path);
        let base_canonical = self.root.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;
        let canonical = path
            .canonicalize()
            .map_err(|_| StorageError::NotFound(physical_path.to_string()))?;

        if canonical.strip_prefix(&base_canonical).is_err() {
            return Err(StorageError::InvalidKey(
                "Path resolves outside storage directory".to_string(),
            ));
        }
        Ok(canonical)
    }

    async fn load_metadata(&self, file_id: &str) -> StorageResult<FileMetadata> {
        let sidecar = self.sidecar_path(file_id)?;
        let raw = match fs::read(&sidecar).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(file_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| {
            StorageError::BackendError(format!("Corrupt metadata for {}: {}", file_id, e))
        })
    }

    /// Write already validated bytes. Shared with the size-capped provider.
    pub(crate) async fn write_validated(
        &self,
        bytes: &[u8],
        mime_type: String,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure> {
        let start = Instant::now();
        let file_id = options.file_id.unwrap_or_else(Uuid::new_v4);

        let dir = match options.event_id {
            Some(event_id) => self.root.join(event_id.to_string()),
            None => self.root.clone(),
        };
        let path = dir.join(stored_file_name(file_id, &options.file_name));

        let unavailable = |action: &str, e: std::io::Error| {
            UploadFailure::BackendUnavailable(format!(
                "Failed to {} {}: {}",
                action,
                path.display(),
                e
            ))
        };

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| unavailable("create directory for", e))?;
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| unavailable("create file", e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| unavailable("write file", e))?;
        file.sync_all()
            .await
            .map_err(|e| unavailable("sync file", e))?;

        let file_hash = hash_bytes(bytes);
        let physical_path = path.to_string_lossy().into_owned();
        let metadata = FileMetadata {
            id: file_id.to_string(),
            name: options.file_name.clone(),
            mime_type: mime_type.clone(),
            size: bytes.len() as u64,
            physical_path: physical_path.clone(),
            uploaded_at: Some(Utc::now()),
            event_id: options.event_id,
            slot: options.slot,
            expiry_date: options.expiry_date,
            file_hash: Some(file_hash.clone()),
        };

        if let Err(e) = self.write_sidecar(&metadata).await {
            let _ = fs::remove_file(&path).await;
            return Err(UploadFailure::BackendUnavailable(format!(
                "Failed to write metadata for {}: {}",
                file_id, e
            )));
        }

        tracing::info!(
            path = %path.display(),
            file_id = %file_id,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StoredFile {
            id: file_id.to_string(),
            url: self.url_for(file_id),
            physical_path,
            file_hash,
            size: bytes.len() as u64,
            mime_type,
        })
    }

    async fn write_sidecar(&self, metadata: &FileMetadata) -> StorageResult<()> {
        let sidecar = self.sidecar_path(&metadata.id)?;
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        fs::write(&sidecar, json).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    async fn upload(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure> {
        let (bytes, mime_type) = self.policy.validate(content, options)?;
        self.write_validated(&bytes, mime_type, options).await
    }

    async fn get_url(&self, file_id: &str) -> StorageResult<String> {
        let metadata = self.load_metadata(file_id).await?;
        let id = Uuid::parse_str(&metadata.id)
            .map_err(|_| StorageError::InvalidKey(metadata.id.clone()))?;
        Ok(self.url_for(id))
    }

    async fn delete(&self, file_id: &str) -> bool {
        let start = Instant::now();
        let metadata = match self.load_metadata(file_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(file_id = %file_id, error = %e, "Nothing to delete");
                return false;
            }
        };

        let removed = match self.checked_path(&metadata.physical_path) {
            Ok(path) => match fs::remove_file(&path).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to remove local file"
                    );
                    false
                }
            },
            Err(e) => {
                tracing::warn!(file_id = %file_id, error = %e, "Stored path no longer resolvable");
                false
            }
        };

        if let Ok(sidecar) = self.sidecar_path(file_id) {
            let _ = fs::remove_file(sidecar).await;
        }

        if removed {
            tracing::info!(
                file_id = %file_id,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage delete successful"
            );
        }
        removed
    }

    async fn get_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        self.load_metadata(file_id).await.ok()
    }

    async fn read(&self, physical_path: &str) -> StorageResult<Vec<u8>> {
        let path = self.checked_path(physical_path)?;
        let start = Instant::now();
        let data = fs::read(&path).await?;

        tracing::debug!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );
        Ok(data)
    }

    fn supports_large_files(&self) -> bool {
        false
    }

    fn max_file_size(&self) -> u64 {
        self.policy.max_file_size
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn policy(&self) -> &UploadPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn provider(root: &Path) -> LocalProvider {
        LocalProvider::new(
            root,
            None,
            UploadPolicy::new(1024, &["application/pdf", "image/png"]),
        )
        .await
        .unwrap()
    }

    fn pdf() -> DocumentContent {
        DocumentContent::Binary(b"%PDF-1.4 lab results".to_vec())
    }

    #[tokio::test]
    async fn test_upload_under_event_directory() {
        let dir = tempdir().unwrap();
        let storage = provider(dir.path()).await;
        let event_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let options = UploadOptions::new("lab results.pdf", "application/pdf")
            .with_event(event_id)
            .with_file_id(file_id);
        let stored = storage.upload(&pdf(), &options).await.unwrap();

        assert_eq!(stored.id, file_id.to_string());
        assert_eq!(stored.url, format!("/files/{}/download", file_id));
        assert!(stored
            .physical_path
            .ends_with(&format!("{}/{}-lab_results.pdf", event_id, file_id)));
        assert_eq!(stored.file_hash, hash_bytes(b"%PDF-1.4 lab results"));

        let bytes = storage.read(&stored.physical_path).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 lab results");
    }

    #[tokio::test]
    async fn test_upload_without_event_is_flat() {
        let dir = tempdir().unwrap();
        let storage = provider(dir.path()).await;
        let stored = storage
            .upload(&pdf(), &UploadOptions::new("a.pdf", "application/pdf"))
            .await
            .unwrap();
        let parent = Path::new(&stored.physical_path).parent().unwrap();
        assert_eq!(parent, dir.path());
    }

    #[tokio::test]
    async fn test_public_base_url_prefixes_download_route() {
        let dir = tempdir().unwrap();
        let storage = LocalProvider::new(
            dir.path(),
            Some("https://portal.example/".to_string()),
            UploadPolicy::new(1024, &["application/pdf"]),
        )
        .await
        .unwrap();
        let stored = storage
            .upload(&pdf(), &UploadOptions::new("a.pdf", "application/pdf"))
            .await
            .unwrap();
        assert_eq!(
            stored.url,
            format!("https://portal.example/files/{}/download", stored.id)
        );
        assert_eq!(storage.get_url(&stored.id).await.unwrap(), stored.url);
    }

    #[tokio::test]
    async fn test_metadata_and_delete_use_sidecar() {
        let dir = tempdir().unwrap();
        let storage = provider(dir.path()).await;
        let stored = storage
            .upload(
                &pdf(),
                &UploadOptions::new("a.pdf", "application/pdf").with_event(Uuid::new_v4()),
            )
            .await
            .unwrap();

        let metadata = storage.get_metadata(&stored.id).await.unwrap();
        assert_eq!(metadata.physical_path, stored.physical_path);
        assert_eq!(metadata.mime_type, "application/pdf");

        assert!(storage.delete(&stored.id).await);
        assert!(!Path::new(&stored.physical_path).exists());
        assert!(storage.get_metadata(&stored.id).await.is_none());
        assert!(!storage.delete(&stored.id).await);
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_nothing() {
        let dir = tempdir().unwrap();
        let storage = provider(dir.path()).await;
        let result = storage
            .upload(
                &DocumentContent::Binary(vec![0u8; 16]),
                &UploadOptions::new("tool.exe", "application/octet-stream"),
            )
            .await;
        assert!(matches!(result, Err(UploadFailure::UnsupportedType { .. })));

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        let only = entries.next().unwrap().unwrap();
        assert_eq!(only.file_name(), META_DIR);
        assert!(entries.next().is_none());
        assert_eq!(std::fs::read_dir(dir.path().join(META_DIR)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_read_outside_root_is_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, b"secret").unwrap();

        let storage = provider(dir.path()).await;
        let result = storage.read(&secret.to_string_lossy()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let traversal = format!("{}/../secret.txt", dir.path().display());
        assert!(matches!(
            storage.read(&traversal).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_non_uuid_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let storage = provider(dir.path()).await;
        assert!(!storage.delete("../../etc/passwd").await);
        assert!(matches!(
            storage.get_url("../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
