//! Shared upload validation
//!
//! Providers differ in their ceilings and allowlists but apply them identically:
//! decode, then size, then MIME type.

use std::borrow::Cow;

use medvault_core::DocumentContent;

use crate::traits::{UploadFailure, UploadOptions};

/// Size ceiling and MIME allowlist applied before any bytes are written.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub allowed_mime_types: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_file_size: u64, allowed_mime_types: &[impl AsRef<str>]) -> Self {
        Self {
            max_file_size,
            allowed_mime_types: allowed_mime_types
                .iter()
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), UploadFailure> {
        if size > self.max_file_size {
            return Err(UploadFailure::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn check_mime_type(&self, mime_type: &str) -> Result<(), UploadFailure> {
        if self.allowed_mime_types.iter().any(|m| m == mime_type) {
            Ok(())
        } else {
            Err(UploadFailure::UnsupportedType {
                mime_type: mime_type.to_string(),
                allowed: self.allowed_mime_types.clone(),
            })
        }
    }

    /// Decode `content` and run the size and MIME checks in order.
    ///
    /// Returns the decoded bytes and the normalized MIME type.
    pub fn validate<'a>(
        &self,
        content: &'a DocumentContent,
        options: &UploadOptions,
    ) -> Result<(Cow<'a, [u8]>, String), UploadFailure> {
        let bytes = content
            .decode()
            .map_err(|e| UploadFailure::InvalidContent(e.to_string()))?;
        if bytes.is_empty() {
            return Err(UploadFailure::InvalidContent("file is empty".to_string()));
        }

        self.check_size(bytes.len() as u64)?;

        let mime_type = effective_mime_type(content, options);
        self.check_mime_type(&mime_type)?;

        Ok((bytes, mime_type))
    }
}

/// Lowercased MIME type without parameters. Falls back to the type declared in a data URL.
pub fn effective_mime_type(content: &DocumentContent, options: &UploadOptions) -> String {
    let declared = if options.mime_type.trim().is_empty() {
        content.declared_mime_type().unwrap_or("")
    } else {
        options.mime_type.as_str()
    };
    declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}
