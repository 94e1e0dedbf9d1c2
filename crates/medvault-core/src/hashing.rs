//! Content hashing
//!
//! Documents reach the service either as raw bytes or as text in a transport encoding
//! (base64, optionally wrapped in a `data:` URL). The digest is always computed over the
//! decoded bytes, so the same file hashes identically whichever way it arrived.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// Failure to turn a document body into bytes.
#[derive(Debug, thiserror::Error)]
pub enum ContentDecodingError {
    #[error("Invalid base64 content: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Malformed data URL: expected 'data:<mime>;base64,<payload>'")]
    MalformedDataUrl,
}

/// A document body as received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Binary(Vec<u8>),
    /// Base64 text, or a `data:<mime>;base64,<payload>` URL.
    Base64(String),
}

impl DocumentContent {
    /// Decode the body into raw bytes.
    pub fn decode(&self) -> Result<Cow<'_, [u8]>, ContentDecodingError> {
        match self {
            DocumentContent::Binary(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            DocumentContent::Base64(text) => {
                let payload = strip_data_url(text)?;
                let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
                Ok(Cow::Owned(STANDARD.decode(compact.as_bytes())?))
            }
        }
    }

    /// MIME type declared by a data URL prefix, if any.
    pub fn declared_mime_type(&self) -> Option<&str> {
        match self {
            DocumentContent::Base64(text) => text
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
                .map(|(mime, _)| mime)
                .filter(|mime| !mime.is_empty()),
            DocumentContent::Binary(_) => None,
        }
    }

    /// Hex digest of the decoded bytes.
    pub fn hash(&self) -> Result<String, ContentDecodingError> {
        Ok(hash_bytes(&self.decode()?))
    }
}

impl From<Vec<u8>> for DocumentContent {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentContent::Binary(bytes)
    }
}

fn strip_data_url(text: &str) -> Result<&str, ContentDecodingError> {
    match text.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .ok_or(ContentDecodingError::MalformedDataUrl),
        None => Ok(text),
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
