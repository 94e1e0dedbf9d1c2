use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// User role for authorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Patient,
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "patient" | "user" => Ok(UserRole::Patient),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, placed in request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl UserContext {
    /// Whether the caller may read or change data owned by `owner_id`.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.role == UserRole::Admin || self.user_id == owner_id
    }
}

impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "Missing user context".to_string(),
                        details: None,
                        error_type: None,
                        code: "MISSING_USER_CONTEXT".to_string(),
                        recoverable: false,
                        suggested_action: Some("Check the authentication token".to_string()),
                    }),
                )
            })
    }
}
