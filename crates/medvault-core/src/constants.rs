//! Application-wide constants

/// Hard ceiling applied by the size-capped provider (platform payload limit).
pub const CAPPED_MAX_FILE_SIZE_BYTES: u64 = 4 * 1024 * 1024;

/// MIME types the size-capped provider accepts. Replaces, not extends, the generic allowlist.
pub const CAPPED_ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Generic allowlist used when `ALLOWED_MIME_TYPES` is not set.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// Generic per-file ceiling used when `MAX_FILE_SIZE_MB` is not set.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 20;

/// Ceiling for the cold/large-file provider when `COLD_MAX_FILE_SIZE_MB` is not set.
pub const DEFAULT_COLD_MAX_FILE_SIZE_MB: u64 = 500;

/// Used in orphan reasons when the owning professional cannot be resolved.
pub const UNKNOWN_PROFESSIONAL: &str = "unknown professional";

/// Route prefix of the internal download redirect (`/files/{id}/download`).
pub const FILES_ROUTE_PREFIX: &str = "/files";
