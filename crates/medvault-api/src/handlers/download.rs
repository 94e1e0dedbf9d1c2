use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::{DownloadService, DownloadTarget};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use uuid::Uuid;

/// Quote-safe value for a `Content-Disposition` filename.
fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/files/{id}/download",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document bytes", content_type = "application/octet-stream"),
        (status = 307, description = "Redirect to the durable remote URL"),
        (status = 403, description = "Document belongs to another user", body = ErrorResponse),
        (status = 404, description = "Document or file not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = %user.user_id, document_id = %id, operation = "download"))]
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let response = match DownloadService::from_state(&state).download(&user, id).await? {
        DownloadTarget::Redirect(url) => Redirect::temporary(&url).into_response(),
        DownloadTarget::File {
            name,
            mime_type,
            bytes,
        } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", disposition_filename(&name)),
                ),
            ],
            bytes,
        )
            .into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_filename_strips_quotes() {
        assert_eq!(disposition_filename("a\"b\\c.pdf"), "a_b_c.pdf");
        assert_eq!(disposition_filename("scan\r\n.pdf"), "scan__.pdf");
        assert_eq!(disposition_filename("résultat.pdf"), "résultat.pdf");
    }
}
