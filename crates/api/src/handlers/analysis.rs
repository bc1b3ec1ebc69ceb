//! Read-side consensus analysis.
//!
//! Every call reloads the annotations and recomputes the report; nothing is
//! cached. Adjudicated consensus results are excluded so they do not count
//! as another reviewer's opinion.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use radreview_core::discrepancy::detect_discrepancies;
use radreview_core::reliability::calculate_reliability;
use radreview_core::report::generate_report;
use radreview_core::types::DbId;
use radreview_db::repositories::AnnotationRepo;

use crate::error::AppResult;
use crate::handlers::consensus::load_session_for_participant;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /studies/{study_uid}/discrepancies
pub async fn study_discrepancies(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(study_uid): Path<String>,
) -> AppResult<impl IntoResponse> {
    let annotations = AnnotationRepo::list_by_study(&state.pool, &study_uid, false).await?;
    let report = detect_discrepancies(&annotations);

    tracing::debug!(
        study_uid = %study_uid,
        annotations = annotations.len(),
        discrepancies = report.discrepancies.len(),
        "Study discrepancies computed"
    );

    Ok(Json(DataResponse { data: report }))
}

/// GET /studies/{study_uid}/reliability
pub async fn study_reliability(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(study_uid): Path<String>,
) -> AppResult<impl IntoResponse> {
    let annotations = AnnotationRepo::list_by_study(&state.pool, &study_uid, false).await?;
    let report = calculate_reliability(&annotations, state.config.agreement_coefficient);
    Ok(Json(DataResponse { data: report }))
}

/// GET /consensus/sessions/{id}/discrepancies
pub async fn session_discrepancies(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_session_for_participant(&state.pool, session_id, auth.user_id).await?;

    let annotations = AnnotationRepo::list_by_session(&state.pool, session_id, false).await?;
    let report = detect_discrepancies(&annotations);

    tracing::debug!(
        session_id,
        annotations = annotations.len(),
        discrepancies = report.discrepancies.len(),
        "Session discrepancies computed"
    );

    Ok(Json(DataResponse { data: report }))
}

/// GET /consensus/sessions/{id}/reliability
pub async fn session_reliability(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_session_for_participant(&state.pool, session_id, auth.user_id).await?;

    let annotations = AnnotationRepo::list_by_session(&state.pool, session_id, false).await?;
    let report = calculate_reliability(&annotations, state.config.agreement_coefficient);
    Ok(Json(DataResponse { data: report }))
}

/// GET /consensus/sessions/{id}/report
pub async fn session_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;

    let annotations = AnnotationRepo::list_by_session(&state.pool, session_id, false).await?;
    let report = generate_report(
        &session.study_uid,
        &annotations,
        state.config.agreement_coefficient,
    );
    Ok(Json(DataResponse { data: report }))
}
