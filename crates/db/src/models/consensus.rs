//! Consensus session, discussion, comment, and vote models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use radreview_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A row from the `consensus_sessions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusSession {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub study_uid: String,
    pub status: String,
    pub creator_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Session row plus membership counts and the creator's username.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusSessionSummary {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub study_uid: String,
    pub status: String,
    pub creator_id: DbId,
    pub creator_name: String,
    pub reviewer_count: i64,
    pub annotation_count: i64,
    pub discussion_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsensusSession {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub study_uid: String,
    pub reviewer_ids: Option<Vec<DbId>>,
    pub annotation_ids: Option<Vec<DbId>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSessionAnnotations {
    pub annotation_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSessionReviewers {
    pub reviewer_ids: Vec<DbId>,
}

/// Adjudicated result recorded by the session creator. The study comes from
/// the session; confidence defaults to the maximum.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsensusResult {
    #[validate(length(min = 1, max = 255))]
    pub finding: String,
    #[validate(range(min = 0.0, max = 10.0))]
    pub confidence_level: Option<f64>,
    pub series_uid: Option<String>,
    pub instance_uid: Option<String>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Discussions and comments
// ---------------------------------------------------------------------------

/// A row from `consensus_discussions` with the creator's username and the
/// number of comments.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusDiscussion {
    pub id: DbId,
    pub session_id: DbId,
    pub title: String,
    pub creator_id: DbId,
    pub creator_name: String,
    pub annotation_id: Option<DbId>,
    pub status: String,
    pub comment_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscussion {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub annotation_id: Option<DbId>,
}

/// A row from `consensus_comments` with the author's username.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusComment {
    pub id: DbId,
    pub discussion_id: DbId,
    pub author_id: DbId,
    pub author_name: String,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// A row from `consensus_votes` with the reviewer's username.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusVote {
    pub id: DbId,
    pub session_id: DbId,
    pub reviewer_id: DbId,
    pub reviewer_name: String,
    pub annotation_id: Option<DbId>,
    pub discussion_id: Option<DbId>,
    pub value: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVote {
    pub value: String,
    pub annotation_id: Option<DbId>,
    pub discussion_id: Option<DbId>,
}
