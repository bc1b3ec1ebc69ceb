//! Repository for `consensus_votes`. Votes are append-only: no dedup and no
//! tally is kept here.

use sqlx::PgPool;
use radreview_core::types::DbId;

use crate::models::consensus::{ConsensusVote, CreateVote};
use crate::repositories::{ConsensusSessionRepo, SessionWrite};

/// Vote projection over a row set named `v`.
const COLUMNS: &str = "v.id, v.session_id, v.reviewer_id, u.username AS reviewer_name, \
    v.annotation_id, v.discussion_id, v.value, v.created_at, v.updated_at";

pub struct VoteRepo;

impl VoteRepo {
    /// Record a vote in an active session.
    pub async fn cast(
        pool: &PgPool,
        session_id: DbId,
        reviewer_id: DbId,
        input: &CreateVote,
    ) -> Result<SessionWrite<ConsensusVote>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        if let Err(outcome) = ConsensusSessionRepo::lock_active(&mut tx, session_id).await? {
            return Ok(outcome);
        }

        let query = format!(
            "WITH v AS (
                 INSERT INTO consensus_votes
                     (session_id, reviewer_id, annotation_id, discussion_id, value)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING *
             )
             SELECT {COLUMNS} FROM v JOIN users u ON u.id = v.reviewer_id"
        );
        let vote = sqlx::query_as::<_, ConsensusVote>(&query)
            .bind(session_id)
            .bind(reviewer_id)
            .bind(input.annotation_id)
            .bind(input.discussion_id)
            .bind(&input.value)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SessionWrite::Applied(vote))
    }

    /// List a session's votes in the order they were cast.
    pub async fn list_by_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<ConsensusVote>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS}
             FROM consensus_votes v
             JOIN users u ON u.id = v.reviewer_id
             WHERE v.session_id = $1
             ORDER BY v.created_at ASC, v.id ASC"
        );
        sqlx::query_as::<_, ConsensusVote>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
