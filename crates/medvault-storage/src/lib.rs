//! Medvault Storage Library
//!
//! Every backend implements [`StorageProvider`]. The API layer only ever talks to a
//! [`StorageManager`], built once at startup around exactly one provider.
//!
//! # Validation order
//!
//! Every `upload` checks the decoded size first, then the MIME type, then whatever the
//! backend itself requires. A rejected upload leaves nothing behind.
//!
//! # File identifiers
//!
//! - **Local / capped**: a UUID; bytes live at `{root}/{event_id}/{id}-{name}` (or flat when
//!   there is no event) with a JSON sidecar at `{root}/.meta/{id}.json`.
//! - **Object / cold**: the durable public URL returned by the backend.

pub mod capped;
pub mod cold;
pub(crate) mod keys;
pub mod local;
pub mod manager;
pub mod object;
pub mod traits;
pub mod validation;

// Re-export commonly used types
pub use capped::CappedProvider;
pub use cold::ColdProvider;
pub use local::LocalProvider;
pub use manager::StorageManager;
pub use medvault_core::ProviderKind;
pub use object::ObjectProvider;
pub use traits::{
    FileMetadata, StorageError, StorageProvider, StorageResult, StoredFile, UploadFailure,
    UploadOptions,
};
pub use validation::UploadPolicy;
