//! Route definitions for consensus sessions and discussions.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{analysis, consensus};
use crate::state::AppState;

/// Routes mounted at `/consensus`.
///
/// ```text
/// GET    /sessions                          -> list_sessions (?studyUid, ?status)
/// POST   /sessions                          -> create_session
/// GET    /sessions/{id}                     -> get_session
/// PUT    /sessions/{id}/status              -> update_session_status
/// GET    /sessions/{id}/annotations         -> list_session_annotations
/// POST   /sessions/{id}/annotations         -> add_session_annotations
/// POST   /sessions/{id}/reviewers           -> add_session_reviewers
/// GET    /sessions/{id}/discussions         -> list_discussions
/// POST   /sessions/{id}/discussions         -> create_discussion
/// GET    /sessions/{id}/votes               -> list_votes
/// POST   /sessions/{id}/votes               -> cast_vote
/// GET    /sessions/{id}/discrepancies       -> session_discrepancies
/// GET    /sessions/{id}/reliability         -> session_reliability
/// GET    /sessions/{id}/report              -> session_report
/// POST   /sessions/{id}/result              -> create_result
/// GET    /discussions/{id}/comments         -> list_comments
/// POST   /discussions/{id}/comments         -> add_comment
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions",
            get(consensus::list_sessions).post(consensus::create_session),
        )
        .route("/sessions/{id}", get(consensus::get_session))
        .route(
            "/sessions/{id}/status",
            put(consensus::update_session_status),
        )
        .route(
            "/sessions/{id}/annotations",
            get(consensus::list_session_annotations).post(consensus::add_session_annotations),
        )
        .route(
            "/sessions/{id}/reviewers",
            post(consensus::add_session_reviewers),
        )
        .route(
            "/sessions/{id}/discussions",
            get(consensus::list_discussions).post(consensus::create_discussion),
        )
        .route(
            "/sessions/{id}/votes",
            get(consensus::list_votes).post(consensus::cast_vote),
        )
        .route(
            "/sessions/{id}/discrepancies",
            get(analysis::session_discrepancies),
        )
        .route(
            "/sessions/{id}/reliability",
            get(analysis::session_reliability),
        )
        .route("/sessions/{id}/report", get(analysis::session_report))
        .route("/sessions/{id}/result", post(consensus::create_result))
        .route(
            "/discussions/{id}/comments",
            get(consensus::list_comments).post(consensus::add_comment),
        )
}
