//! Repository for `consensus_sessions` and its membership tables.
//!
//! Mutations run in a transaction that first locks the session row with
//! `SELECT ... FOR UPDATE`, so concurrent changes to one session are
//! serialised by the database. The status is checked on the locked row; a
//! missing or closed session rolls the transaction back untouched.

use sqlx::PgPool;
use radreview_core::annotation::ConsensusStatus;
use radreview_core::consensus::{
    ensure_session_active, SessionStatus, CONSENSUS_RESULT_SCORE, DEFAULT_RESULT_CONFIDENCE,
};
use radreview_core::error::CoreError;
use radreview_core::types::DbId;

use crate::models::annotation::Annotation;
use crate::models::consensus::{
    ConsensusSession, ConsensusSessionSummary, CreateConsensusResult, CreateConsensusSession,
};
use crate::models::user::User;
use crate::repositories::annotation_repo;

/// Column list for consensus_sessions queries.
const COLUMNS: &str = "id, title, description, study_uid, status, creator_id, \
    created_at, updated_at";

/// Summary projection: session columns, creator name, and membership counts.
const SUMMARY_SELECT: &str = "SELECT s.id, s.title, s.description, s.study_uid, s.status, \
        s.creator_id, u.username AS creator_name, \
        (SELECT COUNT(*) FROM consensus_session_reviewers r WHERE r.session_id = s.id) \
            AS reviewer_count, \
        (SELECT COUNT(*) FROM consensus_session_annotations a WHERE a.session_id = s.id) \
            AS annotation_count, \
        (SELECT COUNT(*) FROM consensus_discussions d WHERE d.session_id = s.id) \
            AS discussion_count, \
        s.created_at, s.updated_at \
     FROM consensus_sessions s \
     JOIN users u ON u.id = s.creator_id";

/// Outcome of a mutation that runs under the session row lock.
#[derive(Debug)]
pub enum SessionWrite<T> {
    Applied(T),
    /// The session, or the discussion naming it, does not exist.
    Missing,
    /// The locked row's status forbids the change.
    Refused(CoreError),
}

impl<T> SessionWrite<T> {
    /// Collapse into a `Result`, reporting `Missing` as `entity` `id` not found.
    pub fn into_result(self, entity: &'static str, id: DbId) -> Result<T, CoreError> {
        match self {
            Self::Applied(value) => Ok(value),
            Self::Missing => Err(CoreError::NotFound { entity, id }),
            Self::Refused(err) => Err(err),
        }
    }
}

pub struct ConsensusSessionRepo;

impl ConsensusSessionRepo {
    /// Create an `active` session, optionally seeding reviewers and
    /// annotations in the same transaction.
    pub async fn create(
        pool: &PgPool,
        creator_id: DbId,
        input: &CreateConsensusSession,
    ) -> Result<ConsensusSession, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO consensus_sessions (title, description, study_uid, creator_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let session = sqlx::query_as::<_, ConsensusSession>(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.study_uid)
            .bind(creator_id)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(ref reviewer_ids) = input.reviewer_ids {
            Self::attach_reviewers_inner(&mut tx, session.id, reviewer_ids).await?;
        }
        if let Some(ref annotation_ids) = input.annotation_ids {
            Self::attach_annotations_inner(&mut tx, session.id, annotation_ids).await?;
        }

        tx.commit().await?;
        Ok(session)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ConsensusSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM consensus_sessions WHERE id = $1");
        sqlx::query_as::<_, ConsensusSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Session with creator name and reviewer/annotation/discussion counts.
    pub async fn find_summary(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ConsensusSessionSummary>, sqlx::Error> {
        let query = format!("{SUMMARY_SELECT} WHERE s.id = $1");
        sqlx::query_as::<_, ConsensusSessionSummary>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Sessions the user created or reviews, newest first, optionally
    /// filtered by study and status.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        study_uid: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<ConsensusSessionSummary>, sqlx::Error> {
        let query = format!(
            "{SUMMARY_SELECT}
             WHERE (s.creator_id = $1 OR EXISTS (
                     SELECT 1 FROM consensus_session_reviewers r
                     WHERE r.session_id = s.id AND r.user_id = $1))
               AND ($2::TEXT IS NULL OR s.study_uid = $2)
               AND ($3::TEXT IS NULL OR s.status = $3)
             ORDER BY s.created_at DESC, s.id DESC"
        );
        sqlx::query_as::<_, ConsensusSessionSummary>(&query)
            .bind(user_id)
            .bind(study_uid)
            .bind(status)
            .fetch_all(pool)
            .await
    }

    /// Union the given annotations into an active session.
    ///
    /// Ids already attached and ids with no annotation row are ignored.
    /// Returns the number of newly attached annotations.
    pub async fn add_annotations(
        pool: &PgPool,
        session_id: DbId,
        annotation_ids: &[DbId],
    ) -> Result<SessionWrite<u64>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        if let Err(outcome) = Self::lock_active(&mut tx, session_id).await? {
            return Ok(outcome);
        }
        let added = Self::attach_annotations_inner(&mut tx, session_id, annotation_ids).await?;
        tx.commit().await?;
        Ok(SessionWrite::Applied(added))
    }

    /// Union the given users into the session's reviewer set. Same semantics
    /// as [`Self::add_annotations`].
    pub async fn add_reviewers(
        pool: &PgPool,
        session_id: DbId,
        reviewer_ids: &[DbId],
    ) -> Result<SessionWrite<u64>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        if let Err(outcome) = Self::lock_active(&mut tx, session_id).await? {
            return Ok(outcome);
        }
        let added = Self::attach_reviewers_inner(&mut tx, session_id, reviewer_ids).await?;
        tx.commit().await?;
        Ok(SessionWrite::Applied(added))
    }

    pub async fn list_reviewer_ids(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT user_id FROM consensus_session_reviewers \
             WHERE session_id = $1 \
             ORDER BY user_id",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_reviewers(pool: &PgPool, session_id: DbId) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT u.id, u.username, u.role, u.created_at, u.updated_at \
             FROM users u \
             JOIN consensus_session_reviewers r ON r.user_id = u.id \
             WHERE r.session_id = $1 \
             ORDER BY u.username",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
    }

    /// Move the session to `next`, validating the transition against the
    /// locked row. Archived sessions never move.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        next: SessionStatus,
    ) -> Result<SessionWrite<ConsensusSession>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(session) = Self::lock_session(&mut tx, id).await? else {
            return Ok(SessionWrite::Missing);
        };

        let current = match SessionStatus::from_str(&session.status) {
            Ok(current) => current,
            Err(e) => return Ok(SessionWrite::Refused(e)),
        };
        if !current.can_transition_to(next) {
            return Ok(SessionWrite::Refused(CoreError::Conflict(format!(
                "Cannot move session from {} to {}",
                current.as_str(),
                next.as_str()
            ))));
        }

        let query = format!(
            "UPDATE consensus_sessions SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, ConsensusSession>(&query)
            .bind(id)
            .bind(next.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SessionWrite::Applied(updated))
    }

    /// Record the adjudicated result as a new `agreed` annotation on the
    /// session's study and attach it to the session.
    ///
    /// Creation and attachment commit together or not at all.
    pub async fn create_consensus_result(
        pool: &PgPool,
        session_id: DbId,
        reviewer_id: DbId,
        input: &CreateConsensusResult,
    ) -> Result<SessionWrite<Annotation>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let session = match Self::lock_active(&mut tx, session_id).await? {
            Ok(session) => session,
            Err(outcome) => return Ok(outcome),
        };

        let query = format!(
            "INSERT INTO annotations
                (study_uid, series_uid, instance_uid, reviewer_id, finding, confidence_level,
                 notes, shapes, consensus_status, consensus_score, is_consensus_result)
             VALUES ($1, $2, $3, $4, $5, $6, $7, '[]'::jsonb, $8, $9, TRUE)
             RETURNING {}",
            annotation_repo::COLUMNS
        );
        let annotation = sqlx::query_as::<_, Annotation>(&query)
            .bind(&session.study_uid)
            .bind(&input.series_uid)
            .bind(&input.instance_uid)
            .bind(reviewer_id)
            .bind(&input.finding)
            .bind(input.confidence_level.unwrap_or(DEFAULT_RESULT_CONFIDENCE))
            .bind(&input.notes)
            .bind(ConsensusStatus::Agreed.as_str())
            .bind(CONSENSUS_RESULT_SCORE)
            .fetch_one(&mut *tx)
            .await?;

        Self::attach_annotations_inner(&mut tx, session_id, &[annotation.id]).await?;

        tx.commit().await?;
        Ok(SessionWrite::Applied(annotation))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Lock the session row for the rest of the transaction.
    async fn lock_session(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: DbId,
    ) -> Result<Option<ConsensusSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM consensus_sessions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ConsensusSession>(&query)
            .bind(session_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock the session and confirm it still accepts changes. On refusal the
    /// caller returns the outcome and drops the transaction.
    pub(crate) async fn lock_active<T>(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: DbId,
    ) -> Result<Result<ConsensusSession, SessionWrite<T>>, sqlx::Error> {
        let Some(session) = Self::lock_session(tx, session_id).await? else {
            return Ok(Err(SessionWrite::Missing));
        };
        let accepts = SessionStatus::from_str(&session.status).and_then(ensure_session_active);
        Ok(match accepts {
            Ok(()) => Ok(session),
            Err(e) => Err(SessionWrite::Refused(e)),
        })
    }

    async fn attach_annotations_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: DbId,
        annotation_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO consensus_session_annotations (session_id, annotation_id) \
             SELECT $1, a.id FROM annotations a WHERE a.id = ANY($2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(session_id)
        .bind(annotation_ids)
        .execute(&mut **tx)
        .await?;

        let added = result.rows_affected();
        if added < annotation_ids.len() as u64 {
            tracing::debug!(
                session_id,
                requested = annotation_ids.len(),
                added,
                "Skipped annotations that were already attached or do not exist"
            );
        }
        Ok(added)
    }

    async fn attach_reviewers_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: DbId,
        reviewer_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO consensus_session_reviewers (session_id, user_id) \
             SELECT $1, u.id FROM users u WHERE u.id = ANY($2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(session_id)
        .bind(reviewer_ids)
        .execute(&mut **tx)
        .await?;

        let added = result.rows_affected();
        if added < reviewer_ids.len() as u64 {
            tracing::debug!(
                session_id,
                requested = reviewer_ids.len(),
                added,
                "Skipped reviewers that were already attached or do not exist"
            );
        }
        Ok(added)
    }
}
