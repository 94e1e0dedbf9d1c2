use crate::auth::UserContext;
use crate::constants::{
    OVERWRITE_CONFIRMED_HEADER, SOURCE_NOTIFICATION_HEADER, TARGET_SLOT_HEADER,
};
use crate::error::{ConflictResponse, ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::owned_event;
use crate::services::{
    origin_for, ProposeDocumentsRequest, SlotOutcome, SlotReconciler, Submission,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use medvault_core::models::{DocumentResponse, Slot};
use medvault_core::AppError;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentResponse>,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn target_slot(headers: &HeaderMap) -> Result<Option<Slot>, AppError> {
    header_value(headers, TARGET_SLOT_HEADER)
        .map(|raw| {
            raw.parse::<Slot>()
                .map_err(|e| AppError::InvalidInput(e.to_string()))
        })
        .transpose()
}

fn overwrite_confirmed(headers: &HeaderMap) -> bool {
    header_value(headers, OVERWRITE_CONFIRMED_HEADER)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn source_notification(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    header_value(headers, SOURCE_NOTIFICATION_HEADER)
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|_| {
                AppError::InvalidInput(format!("{} must be a UUID", SOURCE_NOTIFICATION_HEADER))
            })
        })
        .transpose()
}

#[utoipa::path(
    post,
    path = "/events/{id}/documents",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("x-target-slot" = Option<String>, Header, description = "Only process this slot"),
        ("x-overwrite-confirmed" = Option<bool>, Header, description = "Replace occupied slots"),
        ("x-source-notification" = Option<Uuid>, Header, description = "Notification to archive with the write")
    ),
    request_body = ProposeDocumentsRequest,
    responses(
        (status = 201, description = "Documents stored", body = DocumentsResponse),
        (status = 409, description = "Slot already occupied", body = ConflictResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "File type not accepted", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, headers, body),
    fields(user_id = %user.user_id, event_id = %id, operation = "propose_documents")
)]
pub async fn propose_documents(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Result<ValidatedJson<ProposeDocumentsRequest>, HttpAppError>,
) -> Result<Response, HttpAppError> {
    let reconciler = SlotReconciler::from_state(&state);
    let origin = origin_for(header_value(&headers, SOURCE_NOTIFICATION_HEADER).is_some());

    // Refusals before reconciliation are audited here; the reconciler audits the rest.
    let (label, prepared) = match body {
        Ok(ValidatedJson(request)) => {
            let label = request.label();
            (label, prepare_submission(&state, &user, id, &headers, request).await)
        }
        Err(HttpAppError(e)) => (String::new(), Err(e)),
    };
    let submission = match prepared {
        Ok(submission) => submission,
        Err(e) => {
            reconciler.reject(user.user_id, origin, &label, &e).await;
            return Err(e.into());
        }
    };

    let response = match reconciler.submit(submission).await? {
        SlotOutcome::Stored(records) => (
            StatusCode::CREATED,
            Json(DocumentsResponse {
                documents: records.into_iter().map(DocumentResponse::from).collect(),
            }),
        )
            .into_response(),
        SlotOutcome::Conflict { slot, warning } => (
            StatusCode::CONFLICT,
            Json(ConflictResponse {
                warning,
                slot: slot.to_string(),
            }),
        )
            .into_response(),
    };
    Ok(response)
}

async fn prepare_submission(
    state: &AppState,
    user: &UserContext,
    event_id: Uuid,
    headers: &HeaderMap,
    request: ProposeDocumentsRequest,
) -> Result<Submission, AppError> {
    let event = owned_event(state, user, event_id).await?;

    let source_notification = source_notification(headers)?;
    if let Some(notification_id) = source_notification {
        let notification = state
            .notifications
            .get(notification_id)
            .await?
            .filter(|n| user.can_access(n.user_id))
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
        tracing::debug!(notification_id = %notification.id, "Submission from notification");
    }

    Ok(Submission {
        user_id: user.user_id,
        event,
        documents: request.into_slots()?,
        target_slot: target_slot(headers)?,
        overwrite_confirmed: overwrite_confirmed(headers),
        source_notification,
    })
}

#[utoipa::path(
    get,
    path = "/events/{id}/documents",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Live documents of the event", body = DocumentsResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
pub async fn list_event_documents(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let event = owned_event(&state, &user, id).await?;
    let records = state.documents.list_for_event(event.id).await?;
    Ok(Json(DocumentsResponse {
        documents: records.into_iter().map(DocumentResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/documents/orphaned",
    tag = "documents",
    responses((status = 200, description = "The caller's orphaned documents", body = DocumentsResponse))
)]
pub async fn list_orphaned_documents(
    State(state): State<Arc<AppState>>,
    user: UserContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let records = state.documents.list_orphaned(user.user_id).await?;
    Ok(Json(DocumentsResponse {
        documents: records.into_iter().map(DocumentResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .documents
        .get(id)
        .await?
        .filter(|r| user.can_access(r.user_id))
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
    Ok(Json(DocumentResponse::from(record)))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document and its bytes deleted"),
        (status = 404, description = "Document not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = %user.user_id, document_id = %id, operation = "delete_document"))]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .documents
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
    if !user.can_access(record.user_id) {
        return Err(AppError::Forbidden(format!("Document {} belongs to another user", id)).into());
    }

    // Record first: if it cannot be removed the bytes must stay reachable.
    state.documents.delete(record.id).await?;
    let file_id = record.storage_file_id();
    if !state.storage.delete(&file_id).await {
        tracing::warn!(file_id = %file_id, "Provider did not delete document bytes");
    }

    tracing::info!("Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
