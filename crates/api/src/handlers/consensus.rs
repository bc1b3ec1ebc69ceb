//! Handlers for consensus sessions and their discussions, votes, and results.
//!
//! Any participant (creator or listed reviewer) may read a session and add
//! annotations, discussions, comments, and votes. Adding reviewers, recording
//! the consensus result, and changing status are creator-only. Mutations are
//! refused once a session has left the `active` state; the repository
//! re-checks the status under the session row lock.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use radreview_core::annotation::validate_confidence_level;
use radreview_core::consensus::{
    ensure_creator, ensure_participant, ensure_session_active, validate_comment_content,
    validate_title, SessionStatus, VoteValue,
};
use radreview_core::error::CoreError;
use radreview_core::types::DbId;
use radreview_db::models::consensus::{
    AddSessionAnnotations, AddSessionReviewers, ConsensusSession, ConsensusSessionSummary,
    CreateComment, CreateConsensusResult, CreateConsensusSession, CreateDiscussion, CreateVote,
    UpdateSessionStatus,
};
use radreview_db::models::user::User;
use radreview_db::repositories::{
    AnnotationRepo, ConsensusSessionRepo, DiscussionRepo, VoteRepo,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::error::AppResult;
use crate::handlers::ensure_annotation_exists;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Query filters and response shapes
   -------------------------------------------------------------------------- */

/// Optional filters for listing the caller's sessions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListFilters {
    pub study_uid: Option<String>,
    pub status: Option<String>,
}

/// Session summary plus the reviewer roster.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: ConsensusSessionSummary,
    pub reviewers: Vec<User>,
}

/// Result of a membership union.
#[derive(Debug, Serialize)]
pub struct MembershipChange {
    pub added: u64,
}

/* --------------------------------------------------------------------------
   Shared access helpers
   -------------------------------------------------------------------------- */

const SESSION: &str = "ConsensusSession";
const DISCUSSION: &str = "ConsensusDiscussion";

fn session_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: SESSION,
        id,
    }
}

/// Load a session the caller participates in: 404 if missing, 403 if the
/// caller is neither creator nor reviewer.
pub(crate) async fn load_session_for_participant(
    pool: &PgPool,
    session_id: DbId,
    user_id: DbId,
) -> AppResult<ConsensusSession> {
    let session = ConsensusSessionRepo::find_by_id(pool, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;
    let reviewer_ids = ConsensusSessionRepo::list_reviewer_ids(pool, session_id).await?;
    ensure_participant(session.creator_id, &reviewer_ids, user_id)?;
    Ok(session)
}

fn ensure_active(session: &ConsensusSession) -> AppResult<()> {
    ensure_session_active(SessionStatus::from_str(&session.status)?)?;
    Ok(())
}

async fn load_summary(pool: &PgPool, session_id: DbId) -> AppResult<ConsensusSessionSummary> {
    Ok(ConsensusSessionRepo::find_summary(pool, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?)
}

/* --------------------------------------------------------------------------
   Sessions
   -------------------------------------------------------------------------- */

/// POST /consensus/sessions
pub async fn create_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateConsensusSession>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_title(&input.title)?;

    let session = ConsensusSessionRepo::create(&state.pool, auth.user_id, &input).await?;
    let summary = load_summary(&state.pool, session.id).await?;

    tracing::info!(
        user_id = auth.user_id,
        session_id = session.id,
        study_uid = %session.study_uid,
        reviewers = summary.reviewer_count,
        annotations = summary.annotation_count,
        "Consensus session created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: summary })))
}

/// GET /consensus/sessions
pub async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filters): Query<SessionListFilters>,
) -> AppResult<impl IntoResponse> {
    if let Some(ref status) = filters.status {
        SessionStatus::from_str(status)?;
    }

    let sessions = ConsensusSessionRepo::list_for_user(
        &state.pool,
        auth.user_id,
        filters.study_uid.as_deref(),
        filters.status.as_deref(),
    )
    .await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /consensus/sessions/{id}
pub async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_session_for_participant(&state.pool, session_id, auth.user_id).await?;

    let session = load_summary(&state.pool, session_id).await?;
    let reviewers = ConsensusSessionRepo::list_reviewers(&state.pool, session_id).await?;
    Ok(Json(DataResponse {
        data: SessionDetail { session, reviewers },
    }))
}

/// PUT /consensus/sessions/{id}/status
pub async fn update_session_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<UpdateSessionStatus>,
) -> AppResult<impl IntoResponse> {
    let next = SessionStatus::from_str(&input.status)?;
    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    ensure_creator(session.creator_id, auth.user_id, "change the session status")?;

    let updated = ConsensusSessionRepo::update_status(&state.pool, session_id, next)
        .await?
        .into_result(SESSION, session_id)?;

    tracing::info!(
        user_id = auth.user_id,
        session_id,
        from = %session.status,
        to = next.as_str(),
        "Consensus session status changed"
    );

    Ok(Json(DataResponse { data: updated }))
}

/* --------------------------------------------------------------------------
   Membership
   -------------------------------------------------------------------------- */

/// GET /consensus/sessions/{id}/annotations
pub async fn list_session_annotations(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    let annotations = AnnotationRepo::list_by_session(&state.pool, session_id, true).await?;
    Ok(Json(DataResponse { data: annotations }))
}

/// POST /consensus/sessions/{id}/annotations
pub async fn add_session_annotations(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<AddSessionAnnotations>,
) -> AppResult<impl IntoResponse> {
    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    ensure_active(&session)?;

    let added =
        ConsensusSessionRepo::add_annotations(&state.pool, session_id, &input.annotation_ids)
            .await?
            .into_result(SESSION, session_id)?;

    tracing::info!(
        user_id = auth.user_id,
        session_id,
        requested = input.annotation_ids.len(),
        added,
        "Annotations added to consensus session"
    );

    Ok(Json(DataResponse {
        data: MembershipChange { added },
    }))
}

/// POST /consensus/sessions/{id}/reviewers
pub async fn add_session_reviewers(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<AddSessionReviewers>,
) -> AppResult<impl IntoResponse> {
    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    ensure_creator(session.creator_id, auth.user_id, "add reviewers")?;
    ensure_active(&session)?;

    let added = ConsensusSessionRepo::add_reviewers(&state.pool, session_id, &input.reviewer_ids)
        .await?
        .into_result(SESSION, session_id)?;

    tracing::info!(
        user_id = auth.user_id,
        session_id,
        requested = input.reviewer_ids.len(),
        added,
        "Reviewers added to consensus session"
    );

    Ok(Json(DataResponse {
        data: MembershipChange { added },
    }))
}

/* --------------------------------------------------------------------------
   Discussions and comments
   -------------------------------------------------------------------------- */

/// GET /consensus/sessions/{id}/discussions
pub async fn list_discussions(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    let discussions = DiscussionRepo::list_by_session(&state.pool, session_id).await?;
    Ok(Json(DataResponse { data: discussions }))
}

/// POST /consensus/sessions/{id}/discussions
pub async fn create_discussion(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<CreateDiscussion>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_title(&input.title)?;

    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    ensure_active(&session)?;
    if let Some(annotation_id) = input.annotation_id {
        ensure_annotation_exists(&state.pool, annotation_id).await?;
    }

    let discussion = DiscussionRepo::create(&state.pool, session_id, auth.user_id, &input)
        .await?
        .into_result(SESSION, session_id)?;

    tracing::info!(
        user_id = auth.user_id,
        session_id,
        discussion_id = discussion.id,
        "Consensus discussion opened"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: discussion })))
}

/// Resolve a discussion and confirm the caller participates in its session.
async fn load_discussion_session(
    pool: &PgPool,
    discussion_id: DbId,
    user_id: DbId,
) -> AppResult<ConsensusSession> {
    let discussion = DiscussionRepo::find_by_id(pool, discussion_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: DISCUSSION,
            id: discussion_id,
        })?;
    load_session_for_participant(pool, discussion.session_id, user_id).await
}

/// GET /consensus/discussions/{id}/comments
pub async fn list_comments(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(discussion_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_discussion_session(&state.pool, discussion_id, auth.user_id).await?;
    let comments = DiscussionRepo::list_comments(&state.pool, discussion_id).await?;
    Ok(Json(DataResponse { data: comments }))
}

/// POST /consensus/discussions/{id}/comments
pub async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(discussion_id): Path<DbId>,
    Json(input): Json<CreateComment>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_comment_content(&input.content)?;

    let session = load_discussion_session(&state.pool, discussion_id, auth.user_id).await?;
    ensure_active(&session)?;

    let comment = DiscussionRepo::add_comment(&state.pool, discussion_id, auth.user_id, &input.content)
        .await?
        .into_result(DISCUSSION, discussion_id)?;

    tracing::info!(
        user_id = auth.user_id,
        discussion_id,
        comment_id = comment.id,
        "Consensus comment added"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: comment })))
}

/* --------------------------------------------------------------------------
   Votes
   -------------------------------------------------------------------------- */

/// GET /consensus/sessions/{id}/votes
pub async fn list_votes(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    let votes = VoteRepo::list_by_session(&state.pool, session_id).await?;
    Ok(Json(DataResponse { data: votes }))
}

/// POST /consensus/sessions/{id}/votes
///
/// Appends a vote; earlier votes by the same reviewer are kept.
pub async fn cast_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<CreateVote>,
) -> AppResult<impl IntoResponse> {
    let value = VoteValue::from_str(&input.value)?;

    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    ensure_active(&session)?;

    if let Some(annotation_id) = input.annotation_id {
        ensure_annotation_exists(&state.pool, annotation_id).await?;
    }
    if let Some(discussion_id) = input.discussion_id {
        let discussion = DiscussionRepo::find_by_id(&state.pool, discussion_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: DISCUSSION,
                id: discussion_id,
            })?;
        if discussion.session_id != session_id {
            return Err(CoreError::Validation(format!(
                "Discussion {discussion_id} does not belong to session {session_id}"
            ))
            .into());
        }
    }

    let vote = VoteRepo::cast(&state.pool, session_id, auth.user_id, &input)
        .await?
        .into_result(SESSION, session_id)?;

    tracing::info!(
        user_id = auth.user_id,
        session_id,
        vote_id = vote.id,
        value = value.as_str(),
        "Consensus vote cast"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: vote })))
}

/* --------------------------------------------------------------------------
   Consensus result
   -------------------------------------------------------------------------- */

/// POST /consensus/sessions/{id}/result
///
/// Records the adjudicated finding as an `agreed` annotation on the
/// session's study, attributed to the creator.
pub async fn create_result(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<CreateConsensusResult>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    if let Some(level) = input.confidence_level {
        validate_confidence_level(level)?;
    }

    let session = load_session_for_participant(&state.pool, session_id, auth.user_id).await?;
    ensure_creator(session.creator_id, auth.user_id, "create the consensus result")?;
    ensure_active(&session)?;

    let annotation =
        ConsensusSessionRepo::create_consensus_result(&state.pool, session_id, auth.user_id, &input)
            .await?
            .into_result(SESSION, session_id)?;

    tracing::info!(
        user_id = auth.user_id,
        session_id,
        annotation_id = annotation.id,
        finding = %input.finding,
        "Consensus result recorded"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}
