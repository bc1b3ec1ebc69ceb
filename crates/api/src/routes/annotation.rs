//! Route definitions for the `/annotations` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::annotation;
use crate::state::AppState;

/// Routes mounted at `/annotations`.
///
/// ```text
/// GET    /{id}    -> get_annotation
/// PUT    /{id}    -> update_annotation
/// DELETE /{id}    -> delete_annotation
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{id}",
        get(annotation::get_annotation)
            .put(annotation::update_annotation)
            .delete(annotation::delete_annotation),
    )
}
