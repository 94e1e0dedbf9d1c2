//! Medvault Core Library
//!
//! Domain models, error types, configuration and the content hasher shared by every
//! Medvault crate. Nothing in here talks to a network or a database.

pub mod config;
pub mod constants;
pub mod dates;
pub mod error;
pub mod hashing;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, StorageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hashing::{ContentDecodingError, DocumentContent};
pub use storage_types::ProviderKind;
