//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors from the
//! storage and database layers convert into `HttpAppError` so every failure renders the
//! same `ErrorResponse` body and is logged once at its own level.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medvault_core::{AppError, ErrorMetadata, LogLevel};
use medvault_storage::{StorageError, UploadFailure};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Body of a 409 slot conflict. Deliberately has no `error` field: the client is expected
/// to show the warning and resubmit with the overwrite confirmed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConflictResponse {
    pub warning: String,
    pub slot: String,
}

/// Wrapper type for AppError to implement IntoResponse (orphan rules)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that answers with our `ErrorResponse` on deserialization failure.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

static PRODUCTION: OnceLock<bool> = OnceLock::new();

/// Fix, once at startup, whether error responses hide their details. Later calls are
/// ignored; until it is called responses render as in development.
pub fn set_production_mode(production: bool) {
    if PRODUCTION.set(production).is_err() {
        tracing::debug!("Production mode already set");
    }
}

fn production_mode() -> bool {
    PRODUCTION.get().copied().unwrap_or(false)
}

fn error_body(app_error: &AppError, production: bool) -> ErrorResponse {
    // Details only leave the server outside production, and never for sensitive errors.
    let show_details = !production && !app_error.is_sensitive();
    ErrorResponse {
        error: app_error.client_message(),
        details: show_details.then(|| app_error.detailed_message()),
        error_type: show_details.then(|| app_error.error_type().to_string()),
        code: app_error.error_code().to_string(),
        recoverable: app_error.is_recoverable(),
        suggested_action: app_error.suggested_action().map(String::from),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        (status, Json(error_body(app_error, production_mode()))).into_response()
    }
}

/// Map a refused upload onto the shared taxonomy.
pub fn upload_failure_to_app_error(failure: UploadFailure) -> AppError {
    match failure {
        UploadFailure::TooLarge { size, max } => AppError::PayloadTooLarge { size, max },
        failure @ UploadFailure::UnsupportedType { .. } => {
            AppError::UnsupportedMediaType(failure.to_string())
        }
        UploadFailure::InvalidContent(msg) => AppError::InvalidInput(msg),
        UploadFailure::BackendUnavailable(msg) => AppError::BackendUnavailable(msg),
    }
}

/// Map a storage failure onto the shared taxonomy.
pub fn storage_error_to_app_error(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(msg) => AppError::NotFound(msg),
        StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
        StorageError::BackendError(msg) => AppError::BackendUnavailable(msg),
        StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
        StorageError::ConfigError(msg) => AppError::Internal(msg),
    }
}

impl From<UploadFailure> for HttpAppError {
    fn from(failure: UploadFailure) -> Self {
        HttpAppError(upload_failure_to_app_error(failure))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_error_to_app_error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_maps_to_413() {
        let HttpAppError(app_err) = UploadFailure::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(app_err.http_status_code(), 413);
        assert!(matches!(
            app_err,
            AppError::PayloadTooLarge { size: 10, max: 5 }
        ));
    }

    #[test]
    fn test_unsupported_type_maps_to_415_with_reason() {
        let failure = UploadFailure::UnsupportedType {
            mime_type: "application/pdf".to_string(),
            allowed: vec!["image/png".to_string()],
        };
        let HttpAppError(app_err) = failure.into();
        match app_err {
            AppError::UnsupportedMediaType(msg) => {
                assert!(msg.contains("application/pdf"));
                assert!(msg.contains("image/png"));
            }
            other => panic!("Expected UnsupportedMediaType, got {:?}", other),
        }
    }

    #[test]
    fn test_backend_unavailable_is_sensitive_502() {
        let HttpAppError(app_err) =
            UploadFailure::BackendUnavailable("token rejected by b2".to_string()).into();
        assert_eq!(app_err.http_status_code(), 502);
        assert!(app_err.is_sensitive());
        assert!(!app_err.client_message().contains("b2"));
    }

    #[test]
    fn test_from_storage_error_not_found() {
        let HttpAppError(app_err) = StorageError::NotFound("File not found".to_string()).into();
        match app_err {
            AppError::NotFound(msg) => assert_eq!(msg, "File not found"),
            _ => panic!("Expected NotFound variant"),
        }
    }

    #[test]
    fn test_from_storage_error_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "IO error");
        let HttpAppError(app_err) = StorageError::IoError(io_err).into();
        match app_err {
            AppError::Internal(msg) => assert!(msg.contains("IO error")),
            _ => panic!("Expected Internal variant"),
        }
    }

    #[test]
    fn test_production_body_hides_details() {
        let error = AppError::NotFound("Event 42 not found".to_string());

        let development = error_body(&error, false);
        assert!(development.details.is_some());
        assert_eq!(development.error_type.as_deref(), Some("NotFound"));

        let production = error_body(&error, true);
        assert!(production.details.is_none());
        assert!(production.error_type.is_none());
        assert_eq!(production.code, development.code);
    }

    #[test]
    fn test_conflict_response_has_no_error_field() {
        let json = serde_json::to_value(ConflictResponse {
            warning: "A Result document already exists for this event".to_string(),
            slot: "result".to_string(),
        })
        .unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["slot"], "result");
    }
}
