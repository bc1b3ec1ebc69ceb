//! Repository for the `annotations` table.
//!
//! This is the annotation source for the consensus engine: study and
//! session listings can exclude adjudicated consensus results so they do not
//! count as another reviewer's opinion.

use sqlx::PgPool;
use radreview_core::types::DbId;

use crate::models::annotation::{Annotation, CreateAnnotation, UpdateAnnotation};

/// Column list for annotations queries.
pub(crate) const COLUMNS: &str = "id, study_uid, series_uid, instance_uid, reviewer_id, \
    finding, confidence_level, notes, shapes, consensus_status, consensus_score, \
    is_consensus_result, created_at, updated_at";

pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Create a reviewer annotation on a study, returning the created row.
    pub async fn create(
        pool: &PgPool,
        study_uid: &str,
        reviewer_id: DbId,
        input: &CreateAnnotation,
    ) -> Result<Annotation, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotations
                (study_uid, series_uid, instance_uid, reviewer_id, finding,
                 confidence_level, notes, shapes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, '[]'::jsonb))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .bind(study_uid)
            .bind(&input.series_uid)
            .bind(&input.instance_uid)
            .bind(reviewer_id)
            .bind(&input.finding)
            .bind(input.confidence_level)
            .bind(&input.notes)
            .bind(&input.shapes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Annotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM annotations WHERE id = $1");
        sqlx::query_as::<_, Annotation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a study's annotations in creation order.
    pub async fn list_by_study(
        pool: &PgPool,
        study_uid: &str,
        include_results: bool,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations
             WHERE study_uid = $1 AND ($2 OR NOT is_consensus_result)
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .bind(study_uid)
            .bind(include_results)
            .fetch_all(pool)
            .await
    }

    /// Fetch the given annotations. Unknown ids are silently absent.
    pub async fn list_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations
             WHERE id = ANY($1)
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// List the annotations attached to a session.
    pub async fn list_by_session(
        pool: &PgPool,
        session_id: DbId,
        include_results: bool,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations
             WHERE id IN (
                 SELECT annotation_id FROM consensus_session_annotations WHERE session_id = $1
             )
             AND ($2 OR NOT is_consensus_result)
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .bind(session_id)
            .bind(include_results)
            .fetch_all(pool)
            .await
    }

    /// Update an annotation. Absent fields keep their current value.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateAnnotation,
    ) -> Result<Option<Annotation>, sqlx::Error> {
        let query = format!(
            "UPDATE annotations SET
                finding = COALESCE($2, finding),
                confidence_level = COALESCE($3, confidence_level),
                notes = COALESCE($4, notes),
                shapes = COALESCE($5, shapes),
                consensus_status = COALESCE($6, consensus_status)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .bind(id)
            .bind(&input.finding)
            .bind(input.confidence_level)
            .bind(&input.notes)
            .bind(&input.shapes)
            .bind(&input.consensus_status)
            .fetch_optional(pool)
            .await
    }

    /// Delete an annotation. Returns true if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM annotations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
