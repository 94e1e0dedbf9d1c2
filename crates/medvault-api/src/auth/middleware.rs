//! Bearer token authentication (HS256 JWT)

use crate::auth::models::{JwtClaims, UserContext, UserRole};
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use medvault_core::AppError;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthState {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn verify(&self, token: &str) -> Result<UserContext, AppError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;
        let role = data
            .claims
            .role
            .parse::<UserRole>()
            .map_err(AppError::Unauthorized)?;
        Ok(UserContext {
            user_id: data.claims.sub,
            role,
        })
    }
}

/// Sign a token for `user_id`. Used by account tooling and tests.
pub fn create_token(
    jwt_secret: &str,
    user_id: Uuid,
    role: UserRole,
    ttl_seconds: i64,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id,
        role: role.to_string(),
        exp: now + ttl_seconds,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) => token.trim().to_string(),
            None => {
                return HttpAppError(AppError::Unauthorized(
                    "Invalid authorization header format".to_string(),
                ))
                .into_response();
            }
        },
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    match auth_state.verify(&token) {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, role = %user.role, "Request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Authentication failed");
            HttpAppError(e).into_response()
        }
    }
}
