pub mod annotation;
pub mod consensus;
pub mod health;
pub mod study;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route requires a bearer token.
///
/// ```text
/// /studies/{study_uid}/annotations                 list, create
/// /studies/{study_uid}/discrepancies               detector over the study
/// /studies/{study_uid}/reliability                 inter-rater reliability
///
/// /annotations/{id}                                get, update, delete
///
/// /consensus/sessions                              list mine, create
/// /consensus/sessions/{id}                         detail
/// /consensus/sessions/{id}/status                  change status (PUT, creator)
/// /consensus/sessions/{id}/annotations             list, add
/// /consensus/sessions/{id}/reviewers               add (creator)
/// /consensus/sessions/{id}/discussions             list, open
/// /consensus/sessions/{id}/votes                   list, cast
/// /consensus/sessions/{id}/discrepancies           detector over the session
/// /consensus/sessions/{id}/reliability             inter-rater reliability
/// /consensus/sessions/{id}/report                  diagnostic report
/// /consensus/sessions/{id}/result                  record result (POST, creator)
/// /consensus/discussions/{id}/comments             list, add
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Study-scoped annotations and analysis.
        .nest("/studies", study::router())
        // Single-annotation access.
        .nest("/annotations", annotation::router())
        // Sessions, discussions, votes, results.
        .nest("/consensus", consensus::router())
}
