//! Consensus engine for multi-reviewer imaging annotation.
//!
//! Everything in this crate is pure: the detector and the calculator take a
//! slice of annotations and recompute their reports from scratch on every
//! call. Persistence and HTTP live in `radreview-db` and `radreview-api`.

pub mod annotation;
pub mod consensus;
pub mod discrepancy;
pub mod error;
pub mod geometry;
pub mod reliability;
pub mod report;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;
