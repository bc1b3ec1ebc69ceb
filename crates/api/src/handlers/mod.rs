//! Request handlers.
//!
//! - [`annotation`] -- reviewer annotation CRUD scoped to a study.
//! - [`analysis`] -- discrepancy, reliability, and report endpoints.
//! - [`consensus`] -- sessions, membership, discussions, votes, results.

pub mod analysis;
pub mod annotation;
pub mod consensus;

use radreview_core::error::CoreError;
use radreview_core::types::DbId;
use radreview_db::models::annotation::Annotation;
use radreview_db::repositories::AnnotationRepo;
use sqlx::PgPool;

use crate::error::AppResult;

/// Fetch an annotation or fail with 404.
pub(crate) async fn ensure_annotation_exists(pool: &PgPool, id: DbId) -> AppResult<Annotation> {
    AnnotationRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "Annotation",
                id,
            }
            .into()
        })
}
