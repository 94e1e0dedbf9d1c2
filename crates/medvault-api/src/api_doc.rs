//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use crate::services;
use medvault_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Medvault API",
        version = "0.1.0",
        description = "Patient document storage: slot-based uploads per health event, orphan preservation on deletion, and audited downloads."
    ),
    paths(
        // Documents
        handlers::documents::propose_documents,
        handlers::documents::list_event_documents,
        handlers::documents::list_orphaned_documents,
        handlers::documents::get_document,
        handlers::documents::delete_document,
        handlers::download::download_document,
        // Lifecycle
        handlers::events::delete_event,
        handlers::professionals::delete_professional,
        // Health
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::Slot,
            models::DocumentResponse,
            services::ProposedDocument,
            services::ProposeDocumentsRequest,
            services::EventDeletion,
            services::ProfessionalDeletion,
            handlers::documents::DocumentsResponse,
            handlers::health::HealthResponse,
            error::ErrorResponse,
            error::ConflictResponse,
        )
    ),
    modifiers(&BearerAuth),
    security(("bearer_token" = [])),
    tags(
        (name = "documents", description = "Slot uploads, listing and download of patient documents"),
        (name = "events", description = "Health event deletion with orphan preservation"),
        (name = "professionals", description = "Professional deletion with orphan preservation"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
