//! Storage setup and initialization

use anyhow::{Context, Result};
use medvault_core::Config;
use medvault_storage::StorageManager;

pub async fn setup_storage(config: &Config) -> Result<StorageManager> {
    tracing::info!("Initializing storage provider...");
    let storage = StorageManager::from_config(&config.storage)
        .await
        .context("Failed to initialize storage provider")?;
    tracing::info!(
        provider = %storage.kind(),
        max_file_size_bytes = storage.max_file_size(),
        large_files = storage.supports_large_files(),
        "Storage provider initialized"
    );
    Ok(storage)
}
