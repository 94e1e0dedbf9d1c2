//! Cold / large-file provider (blob-store API)
//!
//! Files are PUT under `documents/...` and addressed afterwards by the public URL the store
//! hands back. Deletion and metadata go through the same API, keyed by that URL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medvault_core::config::ColdStorageConfig;
use medvault_core::hashing::hash_bytes;
use medvault_core::{DocumentContent, ProviderKind};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::keys::remote_object_key;
use crate::traits::{
    FileMetadata, StorageError, StorageProvider, StorageResult, StoredFile, UploadFailure,
    UploadOptions,
};
use crate::validation::UploadPolicy;

const REQUEST_TIMEOUT_SECS: u64 = 600;
const API_VERSION: &str = "7";

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadBlobResponse {
    url: String,
    pathname: String,
    size: u64,
    content_type: Option<String>,
    uploaded_at: Option<DateTime<Utc>>,
}

pub struct ColdProvider {
    client: Client,
    config: ColdStorageConfig,
    policy: UploadPolicy,
}

impl ColdProvider {
    pub fn new(config: ColdStorageConfig, policy: UploadPolicy) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            policy,
        })
    }

    fn api_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.token)
    }
}

#[async_trait]
impl StorageProvider for ColdProvider {
    async fn upload(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure> {
        let (bytes, mime_type) = self.policy.validate(content, options)?;
        let start = Instant::now();

        let file_id = options.file_id.unwrap_or_else(Uuid::new_v4);
        let key = remote_object_key(options.event_id, file_id, &options.file_name);

        let response = self
            .client
            .put(format!("{}/{}", self.api_url(), key))
            .header("Authorization", self.bearer())
            .header("x-api-version", API_VERSION)
            .header("x-content-type", &mime_type)
            .header("x-add-random-suffix", "0")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| UploadFailure::BackendUnavailable(format!("Failed to upload blob: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadFailure::BackendUnavailable(format!(
                "Blob upload failed: {} - {}",
                status, error_text
            )));
        }

        let body: PutBlobResponse = response.json().await.map_err(|e| {
            UploadFailure::BackendUnavailable(format!("Failed to parse blob response: {}", e))
        })?;

        tracing::info!(
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cold storage upload successful"
        );

        Ok(StoredFile {
            id: body.url.clone(),
            url: body.url.clone(),
            physical_path: body.url,
            file_hash: hash_bytes(&bytes),
            size: bytes.len() as u64,
            mime_type,
        })
    }

    async fn get_url(&self, file_id: &str) -> StorageResult<String> {
        self.get_metadata(file_id)
            .await
            .map(|metadata| metadata.physical_path)
            .ok_or_else(|| StorageError::NotFound(file_id.to_string()))
    }

    async fn delete(&self, file_id: &str) -> bool {
        let result = self
            .client
            .post(format!("{}/delete", self.api_url()))
            .header("Authorization", self.bearer())
            .header("x-api-version", API_VERSION)
            .json(&json!({ "urls": [file_id] }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(file_id = %file_id, "Cold storage delete successful");
                true
            }
            Ok(response) => {
                tracing::warn!(
                    file_id = %file_id,
                    status = %response.status(),
                    "Cold storage delete rejected"
                );
                false
            }
            Err(e) => {
                tracing::warn!(file_id = %file_id, error = %e, "Cold storage delete failed");
                false
            }
        }
    }

    async fn get_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        let response = self
            .client
            .get(self.api_url())
            .query(&[("url", file_id)])
            .header("Authorization", self.bearer())
            .header("x-api-version", API_VERSION)
            .send()
            .await
            .map_err(|e| tracing::warn!(file_id = %file_id, error = %e, "Cold storage head failed"))
            .ok()?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return None,
            status => {
                tracing::warn!(file_id = %file_id, status = %status, "Cold storage head rejected");
                return None;
            }
        }

        let head: HeadBlobResponse = response
            .json()
            .await
            .map_err(|e| tracing::warn!(file_id = %file_id, error = %e, "Unreadable blob metadata"))
            .ok()?;

        let name = head
            .pathname
            .rsplit('/')
            .next()
            .unwrap_or(&head.pathname)
            .to_string();

        Some(FileMetadata {
            id: head.url.clone(),
            name,
            mime_type: head
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            size: head.size,
            physical_path: head.url,
            uploaded_at: head.uploaded_at,
            event_id: None,
            slot: None,
            expiry_date: None,
            file_hash: None,
        })
    }

    async fn read(&self, physical_path: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(physical_path.to_string()))
    }

    fn supports_large_files(&self) -> bool {
        true
    }

    fn max_file_size(&self) -> u64 {
        self.policy.max_file_size
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cold
    }

    fn policy(&self) -> &UploadPolicy {
        &self.policy
    }
}
