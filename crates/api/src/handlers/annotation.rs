//! Handlers for reviewer annotations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use radreview_core::annotation::{
    validate_confidence_level, validate_shapes_json, ConsensusStatus,
};
use radreview_core::error::CoreError;
use radreview_core::types::DbId;
use radreview_db::models::annotation::{Annotation, CreateAnnotation, UpdateAnnotation};
use radreview_db::repositories::AnnotationRepo;
use validator::Validate;

use crate::error::AppResult;
use crate::handlers::ensure_annotation_exists;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Only the reviewer who drew an annotation may change or remove it.
fn ensure_author(annotation: &Annotation, user_id: DbId) -> Result<(), CoreError> {
    if annotation.reviewer_id == user_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the annotation's reviewer can modify it".to_string(),
        ))
    }
}

/// GET /studies/{study_uid}/annotations
pub async fn list_study_annotations(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(study_uid): Path<String>,
) -> AppResult<impl IntoResponse> {
    let annotations = AnnotationRepo::list_by_study(&state.pool, &study_uid, true).await?;
    Ok(Json(DataResponse { data: annotations }))
}

/// POST /studies/{study_uid}/annotations
///
/// The caller becomes the annotation's reviewer.
pub async fn create_annotation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(study_uid): Path<String>,
    Json(input): Json<CreateAnnotation>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_confidence_level(input.confidence_level)?;
    if let Some(ref shapes) = input.shapes {
        validate_shapes_json(shapes)?;
    }

    let annotation = AnnotationRepo::create(&state.pool, &study_uid, auth.user_id, &input).await?;

    tracing::info!(
        user_id = auth.user_id,
        annotation_id = annotation.id,
        study_uid = %study_uid,
        "Annotation created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}

/// GET /annotations/{id}
pub async fn get_annotation(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let annotation = ensure_annotation_exists(&state.pool, id).await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// PUT /annotations/{id}
pub async fn update_annotation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateAnnotation>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    if let Some(level) = input.confidence_level {
        validate_confidence_level(level)?;
    }
    if let Some(ref shapes) = input.shapes {
        validate_shapes_json(shapes)?;
    }
    if let Some(ref status) = input.consensus_status {
        ConsensusStatus::from_str(status)?;
    }

    let existing = ensure_annotation_exists(&state.pool, id).await?;
    ensure_author(&existing, auth.user_id)?;

    let annotation = AnnotationRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Annotation",
            id,
        })?;

    tracing::info!(user_id = auth.user_id, annotation_id = id, "Annotation updated");

    Ok(Json(DataResponse { data: annotation }))
}

/// DELETE /annotations/{id}
pub async fn delete_annotation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let existing = ensure_annotation_exists(&state.pool, id).await?;
    ensure_author(&existing, auth.user_id)?;

    AnnotationRepo::delete(&state.pool, id).await?;

    tracing::info!(user_id = auth.user_id, annotation_id = id, "Annotation deleted");

    Ok(StatusCode::NO_CONTENT)
}
