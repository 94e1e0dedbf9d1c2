use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::owned_event;
use crate::services::{EventDeletion, OrphanPreservationService};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEventQuery {
    /// Remove the event's documents and their bytes instead of keeping them as orphans
    #[serde(default)]
    pub delete_files: bool,
}

#[utoipa::path(
    delete,
    path = "/events/{id}",
    tag = "events",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        DeleteEventQuery
    ),
    responses(
        (status = 200, description = "Event deleted", body = EventDeletion),
        (status = 403, description = "Event belongs to another user", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = %user.user_id, event_id = %id, operation = "delete_event"))]
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteEventQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let event = owned_event(&state, &user, id).await?;
    let deletion = OrphanPreservationService::from_state(&state)
        .delete_event(&event, query.delete_files)
        .await?;
    Ok(Json(deletion))
}
