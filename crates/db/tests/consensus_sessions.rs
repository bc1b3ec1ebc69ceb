//! Integration tests for consensus session orchestration.
//!
//! - Session creation with seeded members and the summary read model
//! - Idempotent union when adding annotations and reviewers
//! - Consensus result creation, including rollback when attachment fails
//! - Discussions, comments, and append-only votes
//! - Status re-checked under the row lock: closed sessions refuse writes

use assert_matches::assert_matches;
use radreview_db::models::annotation::{Annotation, CreateAnnotation};
use radreview_db::models::consensus::{
    CreateComment, CreateConsensusResult, CreateConsensusSession, CreateDiscussion, CreateVote,
};
use radreview_core::consensus::SessionStatus;
use radreview_core::error::CoreError;
use radreview_db::models::user::{CreateUser, User};
use radreview_db::repositories::{
    AnnotationRepo, ConsensusSessionRepo, DiscussionRepo, SessionWrite, UserRepo, VoteRepo,
};
use serde_json::json;
use sqlx::PgPool;

const STUDY: &str = "1.2.840.113619.2.55.3";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn user(pool: &PgPool, username: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            role: None,
        },
    )
    .await
    .unwrap()
}

async fn annotation(pool: &PgPool, reviewer_id: i64, finding: &str) -> Annotation {
    AnnotationRepo::create(
        pool,
        STUDY,
        reviewer_id,
        &CreateAnnotation {
            series_uid: None,
            instance_uid: None,
            finding: Some(finding.to_string()),
            confidence_level: 7.0,
            notes: None,
            shapes: Some(json!([
                {"tool": "rectangle", "startX": 0, "startY": 0, "endX": 10, "endY": 10}
            ])),
        },
    )
    .await
    .unwrap()
}

fn new_session(title: &str) -> CreateConsensusSession {
    CreateConsensusSession {
        title: title.to_string(),
        description: None,
        study_uid: STUDY.to_string(),
        reviewer_ids: None,
        annotation_ids: None,
    }
}

fn new_result(finding: &str) -> CreateConsensusResult {
    CreateConsensusResult {
        finding: finding.to_string(),
        confidence_level: None,
        series_uid: None,
        instance_uid: None,
        notes: None,
    }
}

fn applied<T: std::fmt::Debug>(outcome: SessionWrite<T>) -> T {
    match outcome {
        SessionWrite::Applied(value) => value,
        other => panic!("expected an applied write, got {other:?}"),
    }
}

fn vote(value: &str) -> CreateVote {
    CreateVote {
        value: value.to_string(),
        annotation_id: None,
        discussion_id: None,
    }
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

async fn session_annotation_ids(pool: &PgPool, session_id: i64) -> Vec<i64> {
    let mut ids: Vec<i64> = AnnotationRepo::list_by_session(pool, session_id, true)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    ids.sort_unstable();
    ids
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_session_starts_active_and_empty(pool: PgPool) {
    let creator = user(&pool, "dr_house").await;

    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Chest CT"))
        .await
        .unwrap();

    assert_eq!(session.status, "active");
    assert_eq!(session.study_uid, STUDY);
    assert_eq!(session.creator_id, creator.id);

    let summary = ConsensusSessionRepo::find_summary(&pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.creator_name, "dr_house");
    assert_eq!(summary.reviewer_count, 0);
    assert_eq!(summary.annotation_count, 0);
    assert_eq!(summary.discussion_count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_session_seeds_members_and_ignores_unknown_ids(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let reviewer = user(&pool, "reviewer").await;
    let ann = annotation(&pool, reviewer.id, "Nodule").await;

    let input = CreateConsensusSession {
        reviewer_ids: Some(vec![reviewer.id, 99_999]),
        annotation_ids: Some(vec![ann.id, 88_888]),
        ..new_session("Seeded")
    };
    let session = ConsensusSessionRepo::create(&pool, creator.id, &input)
        .await
        .unwrap();

    let reviewers = ConsensusSessionRepo::list_reviewer_ids(&pool, session.id)
        .await
        .unwrap();
    assert_eq!(reviewers, vec![reviewer.id]);
    assert_eq!(session_annotation_ids(&pool, session.id).await, vec![ann.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_for_user_covers_creator_and_reviewer(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let reviewer = user(&pool, "reviewer").await;
    let outsider = user(&pool, "outsider").await;

    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Shared"))
        .await
        .unwrap();
    ConsensusSessionRepo::add_reviewers(&pool, session.id, &[reviewer.id])
        .await
        .unwrap();

    let mine = ConsensusSessionRepo::list_for_user(&pool, creator.id, None, None)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let theirs = ConsensusSessionRepo::list_for_user(&pool, reviewer.id, Some(STUDY), Some("active"))
        .await
        .unwrap();
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0].reviewer_count, 1);

    let filtered = ConsensusSessionRepo::list_for_user(&pool, reviewer.id, None, Some("archived"))
        .await
        .unwrap();
    assert!(filtered.is_empty());

    let none = ConsensusSessionRepo::list_for_user(&pool, outsider.id, None, None)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_status_changes_only_status(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Status"))
        .await
        .unwrap();

    let updated = applied(
        ConsensusSessionRepo::update_status(&pool, session.id, SessionStatus::Completed)
            .await
            .unwrap(),
    );
    assert_eq!(updated.status, "completed");
    assert_eq!(updated.title, "Status");

    let missing = ConsensusSessionRepo::update_status(&pool, 123_456, SessionStatus::Completed)
        .await
        .unwrap();
    assert_matches!(missing, SessionWrite::Missing);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_status_validates_against_the_stored_row(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Lifecycle"))
        .await
        .unwrap();

    let same = ConsensusSessionRepo::update_status(&pool, session.id, SessionStatus::Active)
        .await
        .unwrap();
    assert_matches!(same, SessionWrite::Refused(CoreError::Conflict(_)));

    applied(
        ConsensusSessionRepo::update_status(&pool, session.id, SessionStatus::Archived)
            .await
            .unwrap(),
    );

    let reopened = ConsensusSessionRepo::update_status(&pool, session.id, SessionStatus::Active)
        .await
        .unwrap();
    assert_matches!(
        reopened,
        SessionWrite::Refused(CoreError::Conflict(msg)) if msg.contains("archived")
    );

    let stored = ConsensusSessionRepo::find_by_id(&pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "archived");
}

// ---------------------------------------------------------------------------
// Membership unions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn add_annotations_twice_is_a_union(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let a1 = annotation(&pool, creator.id, "Nodule").await;
    let a2 = annotation(&pool, creator.id, "Mass").await;
    let a3 = annotation(&pool, creator.id, "Cyst").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Union"))
        .await
        .unwrap();

    let first = ConsensusSessionRepo::add_annotations(&pool, session.id, &[a1.id, a2.id])
        .await
        .unwrap();
    assert_matches!(first, SessionWrite::Applied(2));

    let second = ConsensusSessionRepo::add_annotations(&pool, session.id, &[a2.id, a3.id, a3.id])
        .await
        .unwrap();
    assert_matches!(second, SessionWrite::Applied(1));

    assert_eq!(
        session_annotation_ids(&pool, session.id).await,
        vec![a1.id, a2.id, a3.id]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn add_reviewers_is_idempotent(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let r1 = user(&pool, "r1").await;
    let r2 = user(&pool, "r2").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Reviewers"))
        .await
        .unwrap();

    ConsensusSessionRepo::add_reviewers(&pool, session.id, &[r1.id])
        .await
        .unwrap();
    let added = ConsensusSessionRepo::add_reviewers(&pool, session.id, &[r1.id, r2.id, 77_777])
        .await
        .unwrap();
    assert_matches!(added, SessionWrite::Applied(1));

    let reviewers = ConsensusSessionRepo::list_reviewers(&pool, session.id)
        .await
        .unwrap();
    let names: Vec<&str> = reviewers.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["r1", "r2"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn adding_to_unknown_session_changes_nothing(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let ann = annotation(&pool, creator.id, "Nodule").await;

    let result = ConsensusSessionRepo::add_annotations(&pool, 424_242, &[ann.id])
        .await
        .unwrap();
    assert_matches!(result, SessionWrite::Missing);

    let result = ConsensusSessionRepo::add_reviewers(&pool, 424_242, &[creator.id])
        .await
        .unwrap();
    assert_matches!(result, SessionWrite::Missing);

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM consensus_session_annotations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 0);
}

// ---------------------------------------------------------------------------
// Consensus result
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn consensus_result_is_created_and_attached(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let reviewer = user(&pool, "reviewer").await;
    let ann = annotation(&pool, reviewer.id, "Nodule").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Result"))
        .await
        .unwrap();
    ConsensusSessionRepo::add_annotations(&pool, session.id, &[ann.id])
        .await
        .unwrap();

    let result = ConsensusSessionRepo::create_consensus_result(
        &pool,
        session.id,
        creator.id,
        &new_result("Benign nodule"),
    )
    .await
    .unwrap();
    let result = applied(result);

    assert!(result.is_consensus_result);
    assert_eq!(result.consensus_status, "agreed");
    assert_eq!(result.consensus_score, 1.0);
    assert_eq!(result.confidence_level, 10.0);
    assert_eq!(result.study_uid, STUDY);
    assert_eq!(result.reviewer_id, creator.id);
    assert_eq!(result.shapes, json!([]));

    let all = AnnotationRepo::list_by_session(&pool, session.id, true)
        .await
        .unwrap();
    let results: Vec<_> = all.iter().filter(|a| a.is_consensus_result).collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, result.id);

    let reviewers_only = AnnotationRepo::list_by_session(&pool, session.id, false)
        .await
        .unwrap();
    assert_eq!(reviewers_only.len(), 1);
    assert_eq!(reviewers_only[0].id, ann.id);

    let study = AnnotationRepo::list_by_study(&pool, STUDY, false).await.unwrap();
    assert!(study.iter().all(|a| !a.is_consensus_result));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn consensus_result_for_unknown_session_is_missing(pool: PgPool) {
    let creator = user(&pool, "creator").await;

    let result =
        ConsensusSessionRepo::create_consensus_result(&pool, 555, creator.id, &new_result("X"))
            .await
            .unwrap();
    assert_matches!(result, SessionWrite::Missing);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM annotations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn consensus_result_rolls_back_when_attach_fails(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Rollback"))
        .await
        .unwrap();

    // Make the attach step fail after the annotation insert succeeded.
    sqlx::query(
        "CREATE FUNCTION reject_session_link() RETURNS TRIGGER AS $$
         BEGIN
             RAISE EXCEPTION 'attach rejected';
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER trg_reject_session_link
             BEFORE INSERT ON consensus_session_annotations
             FOR EACH ROW EXECUTE FUNCTION reject_session_link()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = ConsensusSessionRepo::create_consensus_result(
        &pool,
        session.id,
        creator.id,
        &new_result("Malignant"),
    )
    .await;
    assert_matches!(err, Err(sqlx::Error::Database(_)));

    let results: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM annotations WHERE is_consensus_result")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(results, 0);
    assert!(session_annotation_ids(&pool, session.id).await.is_empty());
}

// ---------------------------------------------------------------------------
// Discussions, comments, votes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn discussion_with_comments(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let reviewer = user(&pool, "reviewer").await;
    let ann = annotation(&pool, reviewer.id, "Nodule").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Talk"))
        .await
        .unwrap();

    let discussion = DiscussionRepo::create(
        &pool,
        session.id,
        reviewer.id,
        &CreateDiscussion {
            title: "Is this a nodule?".to_string(),
            annotation_id: Some(ann.id),
        },
    )
    .await
    .unwrap();
    let discussion = applied(discussion);
    assert_eq!(discussion.status, "open");
    assert_eq!(discussion.creator_name, "reviewer");
    assert_eq!(discussion.comment_count, 0);

    let input = CreateComment {
        content: "Looks like one to me".to_string(),
    };
    let comment = applied(
        DiscussionRepo::add_comment(&pool, discussion.id, creator.id, &input.content)
            .await
            .unwrap(),
    );
    assert_eq!(comment.author_name, "creator");
    DiscussionRepo::add_comment(&pool, discussion.id, reviewer.id, "Agreed")
        .await
        .unwrap();

    let comments = DiscussionRepo::list_comments(&pool, discussion.id)
        .await
        .unwrap();
    let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["Looks like one to me", "Agreed"]);

    let listed = DiscussionRepo::list_by_session(&pool, session.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment_count, 2);

    let summary = ConsensusSessionRepo::find_summary(&pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.discussion_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn discussion_and_comment_targets_must_exist(pool: PgPool) {
    let creator = user(&pool, "creator").await;

    let discussion = DiscussionRepo::create(
        &pool,
        9_999,
        creator.id,
        &CreateDiscussion {
            title: "Orphan".to_string(),
            annotation_id: None,
        },
    )
    .await
    .unwrap();
    assert_matches!(discussion, SessionWrite::Missing);

    let comment = DiscussionRepo::add_comment(&pool, 9_999, creator.id, "hello")
        .await
        .unwrap();
    assert_matches!(comment, SessionWrite::Missing);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn votes_are_append_only(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Votes"))
        .await
        .unwrap();

    for value in ["agree", "agree", "disagree"] {
        let cast = applied(
            VoteRepo::cast(&pool, session.id, creator.id, &vote(value))
                .await
                .unwrap(),
        );
        assert_eq!(cast.reviewer_name, "creator");
    }

    let votes = VoteRepo::list_by_session(&pool, session.id).await.unwrap();
    let values: Vec<&str> = votes.iter().map(|v| v.value.as_str()).collect();
    assert_eq!(values, vec!["agree", "agree", "disagree"]);

    let missing = VoteRepo::cast(&pool, 31_337, creator.id, &vote("agree"))
        .await
        .unwrap();
    assert_matches!(missing, SessionWrite::Missing);
}

// ---------------------------------------------------------------------------
// Closed sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn completed_session_refuses_every_write(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let reviewer = user(&pool, "reviewer").await;
    let ann = annotation(&pool, reviewer.id, "Nodule").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Closed"))
        .await
        .unwrap();
    let discussion = applied(
        DiscussionRepo::create(
            &pool,
            session.id,
            creator.id,
            &CreateDiscussion {
                title: "Before close".to_string(),
                annotation_id: None,
            },
        )
        .await
        .unwrap(),
    );

    // Close the session after the caller could have read it as active.
    applied(
        ConsensusSessionRepo::update_status(&pool, session.id, SessionStatus::Completed)
            .await
            .unwrap(),
    );

    let added = ConsensusSessionRepo::add_annotations(&pool, session.id, &[ann.id])
        .await
        .unwrap();
    assert_matches!(added, SessionWrite::Refused(CoreError::Conflict(_)));

    let added = ConsensusSessionRepo::add_reviewers(&pool, session.id, &[reviewer.id])
        .await
        .unwrap();
    assert_matches!(added, SessionWrite::Refused(CoreError::Conflict(_)));

    let result = ConsensusSessionRepo::create_consensus_result(
        &pool,
        session.id,
        creator.id,
        &new_result("Late"),
    )
    .await
    .unwrap();
    assert_matches!(result, SessionWrite::Refused(CoreError::Conflict(_)));

    let opened = DiscussionRepo::create(
        &pool,
        session.id,
        creator.id,
        &CreateDiscussion {
            title: "After close".to_string(),
            annotation_id: None,
        },
    )
    .await
    .unwrap();
    assert_matches!(opened, SessionWrite::Refused(CoreError::Conflict(_)));

    let comment = DiscussionRepo::add_comment(&pool, discussion.id, creator.id, "too late")
        .await
        .unwrap();
    assert_matches!(comment, SessionWrite::Refused(CoreError::Conflict(_)));

    let cast = VoteRepo::cast(&pool, session.id, creator.id, &vote("agree"))
        .await
        .unwrap();
    assert_matches!(cast, SessionWrite::Refused(CoreError::Conflict(_)));

    assert!(session_annotation_ids(&pool, session.id).await.is_empty());
    assert!(ConsensusSessionRepo::list_reviewer_ids(&pool, session.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM annotations WHERE is_consensus_result").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM consensus_discussions").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM consensus_comments").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM consensus_votes").await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn refused_write_maps_to_conflict(pool: PgPool) {
    let creator = user(&pool, "creator").await;
    let session = ConsensusSessionRepo::create(&pool, creator.id, &new_session("Archive"))
        .await
        .unwrap();
    applied(
        ConsensusSessionRepo::update_status(&pool, session.id, SessionStatus::Archived)
            .await
            .unwrap(),
    );

    let err = VoteRepo::cast(&pool, session.id, creator.id, &vote("agree"))
        .await
        .unwrap()
        .into_result("ConsensusSession", session.id);
    assert_matches!(err, Err(CoreError::Conflict(_)));

    let err = VoteRepo::cast(&pool, 404_404, creator.id, &vote("agree"))
        .await
        .unwrap()
        .into_result("ConsensusSession", 404_404);
    assert_matches!(err, Err(CoreError::NotFound { entity: "ConsensusSession", id: 404_404 }));
}
