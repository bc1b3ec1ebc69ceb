//! Reviewer accounts. Only attribution data lives here; credentials are
//! handled by the identity provider that issues access tokens.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use radreview_core::types::{DbId, Timestamp};

/// Default role for newly created users.
pub const DEFAULT_ROLE: &str = "radiologist";

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    pub role: Option<String>,
}
