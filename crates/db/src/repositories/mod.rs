//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-statement operations open
//! their own transaction and lock the owning session row first.

pub mod annotation_repo;
pub mod consensus_session_repo;
pub mod discussion_repo;
pub mod user_repo;
pub mod vote_repo;

pub use annotation_repo::AnnotationRepo;
pub use consensus_session_repo::{ConsensusSessionRepo, SessionWrite};
pub use discussion_repo::DiscussionRepo;
pub use user_repo::UserRepo;
pub use vote_repo::VoteRepo;
