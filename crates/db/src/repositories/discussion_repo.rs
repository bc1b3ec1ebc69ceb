//! Repository for `consensus_discussions` and `consensus_comments`.

use sqlx::PgPool;
use radreview_core::consensus::DiscussionStatus;
use radreview_core::types::DbId;

use crate::models::consensus::{ConsensusComment, ConsensusDiscussion, CreateDiscussion};
use crate::repositories::{ConsensusSessionRepo, SessionWrite};

/// Discussion projection with creator name and comment count.
const DISCUSSION_SELECT: &str = "SELECT d.id, d.session_id, d.title, d.creator_id, \
        u.username AS creator_name, d.annotation_id, d.status, \
        (SELECT COUNT(*) FROM consensus_comments c WHERE c.discussion_id = d.id) \
            AS comment_count, \
        d.created_at, d.updated_at \
     FROM consensus_discussions d \
     JOIN users u ON u.id = d.creator_id";

/// Comment projection over a row set named `c`.
const COMMENT_COLUMNS: &str = "c.id, c.discussion_id, c.author_id, u.username AS author_name, \
    c.content, c.created_at, c.updated_at";

pub struct DiscussionRepo;

impl DiscussionRepo {
    /// Open a discussion in an active session.
    pub async fn create(
        pool: &PgPool,
        session_id: DbId,
        creator_id: DbId,
        input: &CreateDiscussion,
    ) -> Result<SessionWrite<ConsensusDiscussion>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        if let Err(outcome) = ConsensusSessionRepo::lock_active(&mut tx, session_id).await? {
            return Ok(outcome);
        }

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO consensus_discussions (session_id, title, creator_id, annotation_id, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(session_id)
        .bind(&input.title)
        .bind(creator_id)
        .bind(input.annotation_id)
        .bind(DiscussionStatus::Open.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let query = format!("{DISCUSSION_SELECT} WHERE d.id = $1");
        let discussion = sqlx::query_as::<_, ConsensusDiscussion>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SessionWrite::Applied(discussion))
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ConsensusDiscussion>, sqlx::Error> {
        let query = format!("{DISCUSSION_SELECT} WHERE d.id = $1");
        sqlx::query_as::<_, ConsensusDiscussion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a session's discussions, oldest first.
    pub async fn list_by_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<ConsensusDiscussion>, sqlx::Error> {
        let query = format!(
            "{DISCUSSION_SELECT} WHERE d.session_id = $1 ORDER BY d.created_at ASC, d.id ASC"
        );
        sqlx::query_as::<_, ConsensusDiscussion>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }

    /// Append a comment to a discussion under the owning session's lock.
    /// `Missing` means the discussion does not exist.
    pub async fn add_comment(
        pool: &PgPool,
        discussion_id: DbId,
        author_id: DbId,
        content: &str,
    ) -> Result<SessionWrite<ConsensusComment>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let session_id: Option<DbId> =
            sqlx::query_scalar("SELECT session_id FROM consensus_discussions WHERE id = $1")
                .bind(discussion_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(session_id) = session_id else {
            return Ok(SessionWrite::Missing);
        };
        if let Err(outcome) = ConsensusSessionRepo::lock_active(&mut tx, session_id).await? {
            return Ok(outcome);
        }

        let query = format!(
            "WITH c AS (
                 INSERT INTO consensus_comments (discussion_id, author_id, content)
                 VALUES ($1, $2, $3)
                 RETURNING *
             )
             SELECT {COMMENT_COLUMNS} FROM c JOIN users u ON u.id = c.author_id"
        );
        let comment = sqlx::query_as::<_, ConsensusComment>(&query)
            .bind(discussion_id)
            .bind(author_id)
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SessionWrite::Applied(comment))
    }

    /// List a discussion's comments, oldest first.
    pub async fn list_comments(
        pool: &PgPool,
        discussion_id: DbId,
    ) -> Result<Vec<ConsensusComment>, sqlx::Error> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS}
             FROM consensus_comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.discussion_id = $1
             ORDER BY c.created_at ASC, c.id ASC"
        );
        sqlx::query_as::<_, ConsensusComment>(&query)
            .bind(discussion_id)
            .fetch_all(pool)
            .await
    }
}
