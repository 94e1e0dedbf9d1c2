//! Object storage / CDN provider (B2-style API)
//!
//! Upload flow: authorize the account (cached), ask for a short-lived upload target, then
//! POST the bytes with their SHA-1. The durable public URL becomes both the file id and
//! its locator.
//!
//! The API offers no cheap way back from a public URL to a file version, so `delete` and
//! `get_metadata` are placeholders that report "nothing done".

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use medvault_core::config::ObjectStorageConfig;
use medvault_core::hashing::hash_bytes;
use medvault_core::{DocumentContent, ProviderKind};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sha1::{Digest, Sha1};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::keys::remote_object_key;
use crate::traits::{
    FileMetadata, StorageError, StorageProvider, StorageResult, StoredFile, UploadFailure,
    UploadOptions,
};
use crate::validation::UploadPolicy;

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
struct B2Session {
    token: String,
    api_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeAccountResponse {
    authorization_token: String,
    api_url: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadFileResponse {
    file_name: String,
}

/// Outcome of one authenticated call: `None` means the token was rejected.
type Authenticated<T> = Result<Option<T>, UploadFailure>;

pub struct ObjectProvider {
    client: Client,
    config: ObjectStorageConfig,
    policy: UploadPolicy,
    session: RwLock<Option<B2Session>>,
}

impl ObjectProvider {
    pub fn new(config: ObjectStorageConfig, policy: UploadPolicy) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            policy,
            session: RwLock::new(None),
        })
    }

    /// Cached session, authorizing on first use.
    async fn session(&self) -> Result<B2Session, UploadFailure> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self.authorize().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn invalidate_session(&self) {
        *self.session.write().await = None;
    }

    async fn authorize(&self) -> Result<B2Session, UploadFailure> {
        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.config.key_id, self.config.application_key
        ));
        let url = format!(
            "{}/b2api/v2/b2_authorize_account",
            self.config.api_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .send()
            .await
            .map_err(|e| backend_unavailable("authorize account", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadFailure::BackendUnavailable(format!(
                "Object storage authorization failed: {} - {}",
                status, error_text
            )));
        }

        let body: AuthorizeAccountResponse = response
            .json()
            .await
            .map_err(|e| backend_unavailable("parse authorization response", e))?;

        tracing::debug!(api_url = %body.api_url, "Object storage account authorized");

        Ok(B2Session {
            token: body.authorization_token,
            api_url: body.api_url.trim_end_matches('/').to_string(),
            download_url: body.download_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_upload_url(&self, session: &B2Session) -> Authenticated<UploadUrlResponse> {
        let response = self
            .client
            .post(format!("{}/b2api/v2/b2_get_upload_url", session.api_url))
            .header("Authorization", &session.token)
            .json(&json!({ "bucketId": self.config.bucket_id }))
            .send()
            .await
            .map_err(|e| backend_unavailable("request upload url", e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadFailure::BackendUnavailable(format!(
                "Object storage upload url request failed: {} - {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| backend_unavailable("parse upload url response", e))
    }

    async fn send_file(
        &self,
        target: &UploadUrlResponse,
        key: &str,
        mime_type: &str,
        sha1: &str,
        bytes: &[u8],
    ) -> Authenticated<UploadFileResponse> {
        let response = self
            .client
            .post(&target.upload_url)
            .header("Authorization", &target.authorization_token)
            .header("X-Bz-File-Name", key)
            .header("Content-Type", mime_type)
            .header("X-Bz-Content-Sha1", sha1)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| backend_unavailable("upload file", e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadFailure::BackendUnavailable(format!(
                "Object storage upload failed: {} - {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| backend_unavailable("parse upload response", e))
    }
}

fn backend_unavailable(action: &str, err: reqwest::Error) -> UploadFailure {
    UploadFailure::BackendUnavailable(format!("Failed to {}: {}", action, err))
}

#[async_trait]
impl StorageProvider for ObjectProvider {
    async fn upload(
        &self,
        content: &DocumentContent,
        options: &UploadOptions,
    ) -> Result<StoredFile, UploadFailure> {
        let (bytes, mime_type) = self.policy.validate(content, options)?;
        let start = Instant::now();

        let file_id = options.file_id.unwrap_or_else(Uuid::new_v4);
        let key = remote_object_key(options.event_id, file_id, &options.file_name);
        let sha1 = hex::encode(Sha1::digest(&bytes));

        // One retry after the cached token is rejected.
        for _ in 0..2 {
            let session = self.session().await?;

            let Some(target) = self.get_upload_url(&session).await? else {
                tracing::debug!("Object storage token rejected, re-authorizing");
                self.invalidate_session().await;
                continue;
            };

            let Some(uploaded) = self
                .send_file(&target, &key, &mime_type, &sha1, &bytes)
                .await?
            else {
                tracing::debug!("Object storage upload token rejected, re-authorizing");
                self.invalidate_session().await;
                continue;
            };

            let url = format!(
                "{}/file/{}/{}",
                session.download_url, self.config.bucket_name, uploaded.file_name
            );

            tracing::info!(
                key = %key,
                size_bytes = bytes.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage upload successful"
            );

            return Ok(StoredFile {
                id: url.clone(),
                url: url.clone(),
                physical_path: url,
                file_hash: hash_bytes(&bytes),
                size: bytes.len() as u64,
                mime_type,
            });
        }

        Err(UploadFailure::BackendUnavailable(
            "Object storage rejected freshly issued credentials".to_string(),
        ))
    }

    async fn get_url(&self, file_id: &str) -> StorageResult<String> {
        if file_id.starts_with("https://") || file_id.starts_with("http://") {
            Ok(file_id.to_string())
        } else {
            Err(StorageError::InvalidKey(format!(
                "object storage ids are public URLs, got {}",
                file_id
            )))
        }
    }

    async fn delete(&self, file_id: &str) -> bool {
        tracing::debug!(file_id = %file_id, "Object storage delete is not supported; file left in place");
        false
    }

    async fn get_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        tracing::debug!(file_id = %file_id, "Object storage metadata lookup is not supported");
        None
    }

    async fn read(&self, physical_path: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(physical_path.to_string()))
    }

    fn supports_large_files(&self) -> bool {
        false
    }

    fn max_file_size(&self) -> u64 {
        self.policy.max_file_size
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Object
    }

    fn policy(&self) -> &UploadPolicy {
        &self.policy
    }
}
