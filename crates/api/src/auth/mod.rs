//! Authentication primitives.
//!
//! - [`jwt`] -- access-token generation and validation.
//!
//! Tokens are issued by the hospital identity service; this server only needs
//! to verify them. [`jwt::generate_access_token`] exists for tooling and tests.

pub mod jwt;
