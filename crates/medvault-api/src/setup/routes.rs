//! Route configuration and setup

use crate::api_doc::get_openapi_spec;
use crate::auth::{auth_middleware, AuthState};
use crate::constants::{
    MAX_REQUEST_BODY_BYTES, OVERWRITE_CONFIRMED_HEADER, REQUEST_BODY_FRAMING_BYTES,
    SOURCE_NOTIFICATION_HEADER, TARGET_SLOT_HEADER,
};
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderName, HeaderValue, Method},
    routing::{delete, get},
    Json, Router,
};
use medvault_core::models::Slot;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the full router. Tests call this with in-memory state.
pub fn build_router(
    state: Arc<AppState>,
    auth: AuthState,
    cors_origins: &[String],
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(cors_origins)?;

    let body_limit = request_body_limit(state.storage.max_file_size());
    tracing::debug!(body_limit, "Request body limit derived from provider file size");

    let protected = protected_routes().layer(axum::middleware::from_fn_with_state(
        Arc::new(auth),
        auth_middleware,
    ));

    let app = public_routes()
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Body ceiling for a submission carrying one base64 file per slot at the provider's size
/// limit. Oversized files then reach the provider checks and get a structured 413.
pub fn request_body_limit(max_file_size: u64) -> usize {
    let encoded = max_file_size.div_ceil(3).saturating_mul(4);
    let limit = encoded
        .saturating_mul(Slot::ALL.len() as u64)
        .saturating_add(REQUEST_BODY_FRAMING_BYTES as u64);
    usize::try_from(limit)
        .unwrap_or(MAX_REQUEST_BODY_BYTES)
        .min(MAX_REQUEST_BODY_BYTES)
}

fn setup_cors(cors_origins: &[String]) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let headers = [
        axum::http::header::AUTHORIZATION,
        axum::http::header::CONTENT_TYPE,
        HeaderName::from_static(TARGET_SLOT_HEADER),
        HeaderName::from_static(OVERWRITE_CONFIRMED_HEADER),
        HeaderName::from_static(SOURCE_NOTIFICATION_HEADER),
    ];

    let cors = if cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {}: {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
    };
    Ok(cors)
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(get_openapi_spec()) }),
        )
}

fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/events/{id}/documents",
            get(handlers::documents::list_event_documents)
                .post(handlers::documents::propose_documents),
        )
        .route("/events/{id}", delete(handlers::events::delete_event))
        .route(
            "/professionals/{id}",
            delete(handlers::professionals::delete_professional),
        )
        .route(
            "/documents/orphaned",
            get(handlers::documents::list_orphaned_documents),
        )
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document).delete(handlers::documents::delete_document),
        )
        .route(
            "/files/{id}/download",
            get(handlers::download::download_document),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_fits_a_maximal_file_in_every_slot() {
        let max = 20 * 1024 * 1024;
        let limit = request_body_limit(max) as u64;
        assert!(limit >= max * 4 / 3 * Slot::ALL.len() as u64);
        assert!(limit <= MAX_REQUEST_BODY_BYTES as u64);
    }

    #[test]
    fn test_body_limit_is_capped_for_large_file_providers() {
        assert_eq!(
            request_body_limit(500 * 1024 * 1024),
            MAX_REQUEST_BODY_BYTES
        );
        assert_eq!(request_body_limit(u64::MAX), MAX_REQUEST_BODY_BYTES);
    }
}
