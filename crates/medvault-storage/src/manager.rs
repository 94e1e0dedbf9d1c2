//! Storage manager
//!
//! Built once at startup from [`StorageConfig`] and shared through application state.
//! It holds exactly one provider and forwards to it; document semantics live elsewhere.

use std::sync::Arc;

use medvault_core::{DocumentContent, ProviderKind, StorageConfig};

use crate::capped::CappedProvider;
use crate::cold::ColdProvider;
use crate::local::LocalProvider;
use crate::object::ObjectProvider;
use crate::traits::{
    FileMetadata, StorageError, StorageProvider, StorageResult, StoredFile, UploadFailure,
    UploadOptions,
};
use crate::validation::UploadPolicy;

#[derive(Clone)]
pub struct StorageManager {
    provider: Arc<dyn StorageProvider>,
}

impl StorageManager {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Create the provider selected by `config.provider`.
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let generic = UploadPolicy::new(config.max_file_size_bytes, &config.allowed_mime_types);

        let provider: Arc<dyn StorageProvider> = match config.provider {
            ProviderKind::Local => Arc::new(
                LocalProvider::new(
                    &config.local_storage_path,
                    config.public_base_url.clone(),
                    generic,
                )
                .await?,
            ),
            ProviderKind::Capped => Arc::new(
                CappedProvider::new(
                    &config.local_storage_path,
                    config.public_base_url.clone(),
                    config.capped_max_file_size_bytes,
                )
                .await?,
            ),
            ProviderKind::Object => {
                let object = config.object.clone().ok_or_else(|| {
                    StorageError::ConfigError("Object storage credentials not configured".to_string())
                })?;
                Arc::new(ObjectProvider::new(object, generic)?)
            }
            ProviderKind::Cold => {
                let cold = config.cold.clone().ok_or_else(|| {
                    StorageError::ConfigError("BLOB_READ_WRITE_TOKEN not configured".to_string())
                })?;
                let policy = if config.allow_large_files {
                    UploadPolicy::new(cold.max_file_size_bytes, &config.allowed_mime_types)
                } else {
                    generic
                };
                Arc::new(ColdProvider::new(cold, policy)?)
            }
        };

        tracing::info!(
            provider = %provider.kind(),
            max_file_size = provider.max_file_size(),
            supports_large_files = provider.supports_large_files(),
            "Storage provider initialized"
        );

        Ok(Self { provider })
    }

    pub async fn upload(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure> {
        self.provider.upload(content, options).await
    }

    /// Validate a document against the active provider without storing it.
    pub fn check(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<(), UploadFailure> {
        self.provider.check(content, options)
    }

    pub async fn get_url(&self, file_id: &str) -> StorageResult<String> {
        self.provider.get_url(file_id).await
    }

    pub async fn delete(&self, file_id: &str) -> bool {
        self.provider.delete(file_id).await
    }

    pub async fn get_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        self.provider.get_metadata(file_id).await
    }

    pub async fn read(&self, physical_path: &str) -> StorageResult<Vec<u8>> {
        self.provider.read(physical_path).await
    }

    pub fn max_file_size(&self) -> u64 {
        self.provider.max_file_size()
    }

    pub fn supports_large_files(&self) -> bool {
        self.provider.supports_large_files()
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::config::ColdStorageConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_config_builds_local_provider() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::local(dir.path());
        let manager = StorageManager::from_config(&config).await.unwrap();
        assert_eq!(manager.kind(), ProviderKind::Local);
        assert_eq!(manager.max_file_size(), 20 * 1024 * 1024);

        let stored = manager
            .upload(
                &DocumentContent::Binary(b"%PDF-1.4".to_vec()),
                &UploadOptions::new("a.pdf", "application/pdf"),
            )
            .await
            .unwrap();
        assert!(manager.get_metadata(&stored.id).await.is_some());
        assert!(manager.delete(&stored.id).await);
    }

    #[tokio::test]
    async fn test_check_refuses_without_storing() {
        let dir = tempdir().unwrap();
        let manager = StorageManager::from_config(&StorageConfig::local(dir.path()))
            .await
            .unwrap();
        let options = UploadOptions::new("notes.txt", "text/plain");
        let content = DocumentContent::Binary(b"hello".to_vec());

        assert!(matches!(
            manager.check(&content, &options),
            Err(UploadFailure::UnsupportedType { .. })
        ));
        let file_id = uuid::Uuid::new_v4();
        let pdf = UploadOptions::new("a.pdf", "application/pdf").with_file_id(file_id);
        assert!(manager.check(&content, &pdf).is_ok());
        assert!(manager.get_metadata(&file_id.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_capped_config_uses_capped_ceiling() {
        let dir = tempdir().unwrap();
        let mut config = StorageConfig::local(dir.path());
        config.provider = ProviderKind::Capped;
        config.capped_max_file_size_bytes = 10;

        let manager = StorageManager::from_config(&config).await.unwrap();
        assert_eq!(manager.kind(), ProviderKind::Capped);
        assert_eq!(manager.max_file_size(), 10);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let dir = tempdir().unwrap();
        let mut config = StorageConfig::local(dir.path());
        config.provider = ProviderKind::Object;
        assert!(matches!(
            StorageManager::from_config(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_large_files_lift_cold_ceiling_only_when_allowed() {
        let dir = tempdir().unwrap();
        let mut config = StorageConfig::local(dir.path());
        config.provider = ProviderKind::Cold;
        config.cold = Some(ColdStorageConfig {
            token: "t".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
            max_file_size_bytes: 500 * 1024 * 1024,
        });

        let manager = StorageManager::from_config(&config).await.unwrap();
        assert_eq!(manager.max_file_size(), 20 * 1024 * 1024);
        assert!(manager.supports_large_files());

        config.allow_large_files = true;
        let manager = StorageManager::from_config(&config).await.unwrap();
        assert_eq!(manager.max_file_size(), 500 * 1024 * 1024);
    }
}
