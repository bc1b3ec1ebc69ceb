//! Consensus session rules: status and vote vocabularies, input limits, and
//! the access checks shared by the repository and API layers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Score recorded on an adjudicated consensus-result annotation.
pub const CONSENSUS_RESULT_SCORE: f64 = 1.0;

/// Confidence used for a consensus result when the caller gives none.
pub const DEFAULT_RESULT_CONFIDENCE: f64 = 10.0;

/// Maximum length for session and discussion titles.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum length for a discussion comment.
pub const MAX_COMMENT_LENGTH: usize = 10_000;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Archived,
}

const VALID_SESSION_STATUSES: &[&str] = &["active", "completed", "archived"];

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(CoreError::Validation(format!(
                "Invalid session status '{s}'. Must be one of: {}",
                VALID_SESSION_STATUSES.join(", ")
            ))),
        }
    }

    /// Archived sessions are terminal; every other move is allowed.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        !matches!(self, Self::Archived) && *self != next
    }
}

// ---------------------------------------------------------------------------
// DiscussionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStatus {
    Open,
    Resolved,
    Closed,
}

const VALID_DISCUSSION_STATUSES: &[&str] = &["open", "resolved", "closed"];

impl DiscussionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(CoreError::Validation(format!(
                "Invalid discussion status '{s}'. Must be one of: {}",
                VALID_DISCUSSION_STATUSES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// VoteValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Agree,
    Disagree,
    Abstain,
}

const VALID_VOTE_VALUES: &[&str] = &["agree", "disagree", "abstain"];

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Disagree => "disagree",
            Self::Abstain => "abstain",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "agree" => Ok(Self::Agree),
            "disagree" => Ok(Self::Disagree),
            "abstain" => Ok(Self::Abstain),
            _ => Err(CoreError::Validation(format!(
                "Invalid vote value '{s}'. Must be one of: {}",
                VALID_VOTE_VALUES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Access checks
// ---------------------------------------------------------------------------

/// The creator and every listed reviewer may read and act on a session.
pub fn is_participant(creator_id: DbId, reviewer_ids: &[DbId], user_id: DbId) -> bool {
    creator_id == user_id || reviewer_ids.contains(&user_id)
}

pub fn ensure_participant(
    creator_id: DbId,
    reviewer_ids: &[DbId],
    user_id: DbId,
) -> Result<(), CoreError> {
    if is_participant(creator_id, reviewer_ids, user_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "You do not have access to this consensus session".to_string(),
        ))
    }
}

/// Creator-only actions: adding reviewers, recording the result, changing
/// status.
pub fn ensure_creator(creator_id: DbId, user_id: DbId, action: &str) -> Result<(), CoreError> {
    if creator_id == user_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Only the session creator can {action}"
        )))
    }
}

/// Mutations are accepted only while the session is active.
pub fn ensure_session_active(status: SessionStatus) -> Result<(), CoreError> {
    match status {
        SessionStatus::Active => Ok(()),
        other => Err(CoreError::Conflict(format!(
            "Consensus session is {}; only active sessions accept changes",
            other.as_str()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Titles must be non-blank and at most [`MAX_TITLE_LENGTH`] characters.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_comment_content(content: &str) -> Result<(), CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::Validation(
            "Comment content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Comment content must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }
    Ok(())
}
