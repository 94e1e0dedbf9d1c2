//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded `Config` to a running router.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::auth::AuthState;
use crate::middleware::TracingAuditSink;
use crate::state::{AppState, DownloadConfig};
use anyhow::{Context, Result};
use medvault_core::Config;
use medvault_db::{
    PgDocumentRepository, PgEventRepository, PgNotificationRepository, PgProfessionalRepository,
};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;
    crate::error::set_production_mode(config.is_production());

    crate::telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.base.environment,
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState {
        documents: Arc::new(PgDocumentRepository::new(pool.clone())),
        events: Arc::new(PgEventRepository::new(pool.clone())),
        professionals: Arc::new(PgProfessionalRepository::new(pool.clone())),
        notifications: Arc::new(PgNotificationRepository::new(pool)),
        storage,
        audit: Arc::new(TracingAuditSink),
        download: DownloadConfig {
            allowed_prefixes: config.storage.download_allowed_prefixes.clone(),
        },
    });

    let router = routes::build_router(
        state.clone(),
        AuthState::new(config.jwt_secret()),
        config.cors_origins(),
    )?;

    Ok((state, router))
}
