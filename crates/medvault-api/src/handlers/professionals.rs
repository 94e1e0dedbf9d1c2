use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::{OrphanPreservationService, ProfessionalDeletion};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use medvault_core::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    delete,
    path = "/professionals/{id}",
    tag = "professionals",
    params(("id" = Uuid, Path, description = "Professional ID")),
    responses(
        (status = 200, description = "Professional deleted, documents preserved as orphans", body = ProfessionalDeletion),
        (status = 403, description = "Professional belongs to another user", body = ErrorResponse),
        (status = 404, description = "Professional not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = %user.user_id, professional_id = %id, operation = "delete_professional"))]
pub async fn delete_professional(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let professional = state
        .professionals
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Professional not found".to_string()))?;
    if !user.can_access(professional.user_id) {
        return Err(AppError::Forbidden(format!(
            "Professional {} belongs to another user",
            id
        ))
        .into());
    }

    let deletion = OrphanPreservationService::from_state(&state)
        .delete_professional(&professional)
        .await?;
    Ok(Json(deletion))
}
