//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches
//!
//! Rows and DTOs use camelCase on the wire, matching the viewer client.

pub mod annotation;
pub mod consensus;
pub mod user;
