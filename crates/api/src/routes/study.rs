//! Route definitions for the `/studies` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{analysis, annotation};
use crate::state::AppState;

/// Routes mounted at `/studies`.
///
/// ```text
/// GET    /{study_uid}/annotations      -> list_study_annotations
/// POST   /{study_uid}/annotations      -> create_annotation
/// GET    /{study_uid}/discrepancies    -> study_discrepancies
/// GET    /{study_uid}/reliability      -> study_reliability
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{study_uid}/annotations",
            get(annotation::list_study_annotations).post(annotation::create_annotation),
        )
        .route(
            "/{study_uid}/discrepancies",
            get(analysis::study_discrepancies),
        )
        .route("/{study_uid}/reliability", get(analysis::study_reliability))
}
