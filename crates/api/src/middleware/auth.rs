//! Reviewer identity for RadReview handlers.
//!
//! Every `/api/v1` route takes an [`AuthUser`]. Its `user_id` is the author
//! recorded on annotations, comments, and votes, and the id checked against a
//! session's creator and reviewer roster.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use radreview_core::error::CoreError;
use radreview_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The radiologist or admin making the request, taken from a
/// `Authorization: Bearer <jwt>` header signed with the configured secret.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// `users.id` from the token subject.
    pub user_id: DbId,
    /// `"radiologist"` or `"admin"`. Session access is decided by membership,
    /// not by role.
    pub role: String,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?;

        let claims = validate_token(token, &state.config.jwt).map_err(|e| {
            tracing::debug!(error = %e, "Rejected reviewer token");
            unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
