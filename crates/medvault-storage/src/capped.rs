//! Size-capped provider
//!
//! Runs on local disk but behaves like a constrained hosting tier: a hard per-file ceiling
//! well below the generic maximum and an image-only allowlist. Both replace the generic
//! policy rather than narrowing it.

use std::path::PathBuf;

use async_trait::async_trait;
use medvault_core::constants::{CAPPED_ALLOWED_MIME_TYPES, CAPPED_MAX_FILE_SIZE_BYTES};
use medvault_core::{DocumentContent, ProviderKind};

use crate::local::LocalProvider;
use crate::traits::{
    FileMetadata, StorageProvider, StorageResult, StoredFile, UploadFailure, UploadOptions,
};
use crate::validation::UploadPolicy;

#[derive(Clone, Debug)]
pub struct CappedProvider {
    inner: LocalProvider,
    policy: UploadPolicy,
}

impl CappedProvider {
    pub async fn new(
        root: impl Into<PathBuf>,
        public_base_url: Option<String>,
        max_file_size: u64,
    ) -> StorageResult<Self> {
        let policy = UploadPolicy::new(max_file_size, CAPPED_ALLOWED_MIME_TYPES);
        let inner = LocalProvider::new(root, public_base_url, policy.clone()).await?;
        Ok(Self { inner, policy })
    }

    /// Provider with the default 4 MiB ceiling.
    pub async fn with_default_ceiling(
        root: impl Into<PathBuf>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        Self::new(root, public_base_url, CAPPED_MAX_FILE_SIZE_BYTES).await
    }
}

#[async_trait]
impl StorageProvider for CappedProvider {
    async fn upload(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure> {
        let (bytes, mime_type) = self.policy.validate(content, options).map_err(|failure| {
            tracing::debug!(
                file_name = %options.file_name,
                reason = %failure,
                "Upload refused by size-capped storage"
            );
            failure
        })?;
        self.inner.write_validated(&bytes, mime_type, options).await
    }

    async fn get_url(&self, file_id: &str) -> StorageResult<String> {
        self.inner.get_url(file_id).await
    }

    async fn delete(&self, file_id: &str) -> bool {
        self.inner.delete(file_id).await
    }

    async fn get_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        self.inner.get_metadata(file_id).await
    }

    async fn read(&self, physical_path: &str) -> StorageResult<Vec<u8>> {
        self.inner.read(physical_path).await
    }

    fn supports_large_files(&self) -> bool {
        false
    }

    fn max_file_size(&self) -> u64 {
        self.policy.max_file_size
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Capped
    }

    fn policy(&self) -> &UploadPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CEILING: u64 = 4 * 1024 * 1024;

    fn png_of(size: usize) -> DocumentContent {
        DocumentContent::Binary(vec![0x89; size])
    }

    #[tokio::test]
    async fn test_exact_ceiling_is_accepted() {
        let dir = tempdir().unwrap();
        let storage = CappedProvider::with_default_ceiling(dir.path(), None)
            .await
            .unwrap();
        let stored = storage
            .upload(
                &png_of(CEILING as usize),
                &UploadOptions::new("scan.png", "image/png"),
            )
            .await
            .unwrap();
        assert_eq!(stored.size, CEILING);
    }

    #[tokio::test]
    async fn test_one_byte_over_is_size_rejection() {
        let dir = tempdir().unwrap();
        let storage = CappedProvider::with_default_ceiling(dir.path(), None)
            .await
            .unwrap();
        let result = storage
            .upload(
                &png_of(CEILING as usize + 1),
                &UploadOptions::new("scan.png", "image/png"),
            )
            .await;
        assert_eq!(
            result.unwrap_err(),
            UploadFailure::TooLarge {
                size: CEILING + 1,
                max: CEILING
            }
        );
    }

    #[tokio::test]
    async fn test_pdf_is_refused_even_though_generically_allowed() {
        let dir = tempdir().unwrap();
        let storage = CappedProvider::with_default_ceiling(dir.path(), None)
            .await
            .unwrap();
        let result = storage
            .upload(
                &DocumentContent::Binary(b"%PDF-1.4".to_vec()),
                &UploadOptions::new("report.pdf", "application/pdf"),
            )
            .await;
        assert!(matches!(result, Err(UploadFailure::UnsupportedType { .. })));
    }

    #[tokio::test]
    async fn test_reports_capped_kind_and_ceiling() {
        let dir = tempdir().unwrap();
        let storage = CappedProvider::new(dir.path(), None, 1000).await.unwrap();
        assert_eq!(storage.kind(), ProviderKind::Capped);
        assert_eq!(storage.max_file_size(), 1000);
        assert!(!storage.supports_large_files());
    }
}
