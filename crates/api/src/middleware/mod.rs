//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated reviewer from a JWT Bearer token.

pub mod auth;
