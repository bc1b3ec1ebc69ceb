//! Reviewer annotation view consumed by the consensus engine.
//!
//! The engine never owns annotation storage. Anything that can expose the
//! fields below (the database row, a test fixture) implements
//! [`ReviewedAnnotation`] and can be fed to the detector and the calculator.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Label used for annotations that carry no finding.
pub const UNSPECIFIED_FINDING: &str = "Unspecified";

/// Lowest accepted confidence level.
pub const MIN_CONFIDENCE_LEVEL: f64 = 0.0;

/// Highest accepted confidence level.
pub const MAX_CONFIDENCE_LEVEL: f64 = 10.0;

/// Maximum length of a finding label.
pub const MAX_FINDING_LENGTH: usize = 255;

// ---------------------------------------------------------------------------
// ReviewedAnnotation
// ---------------------------------------------------------------------------

/// Read-only view of one reviewer's annotation on a study.
pub trait ReviewedAnnotation {
    fn id(&self) -> DbId;
    fn reviewer_id(&self) -> DbId;
    fn finding(&self) -> Option<&str>;
    fn confidence_level(&self) -> f64;
    /// Raw `shapes` array as stored by the viewer.
    fn shapes(&self) -> &serde_json::Value;

    /// Finding label with nulls mapped to [`UNSPECIFIED_FINDING`].
    fn normalized_finding(&self) -> &str {
        normalize_finding(self.finding())
    }
}

/// Map a missing finding to [`UNSPECIFIED_FINDING`].
pub fn normalize_finding(finding: Option<&str>) -> &str {
    finding.unwrap_or(UNSPECIFIED_FINDING)
}

// ---------------------------------------------------------------------------
// ConsensusStatus
// ---------------------------------------------------------------------------

/// Agreement state recorded on an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    Pending,
    Agreed,
    Disputed,
}

const VALID_CONSENSUS_STATUSES: &[&str] = &["pending", "agreed", "disputed"];

impl ConsensusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Agreed => "agreed",
            Self::Disputed => "disputed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "agreed" => Ok(Self::Agreed),
            "disputed" => Ok(Self::Disputed),
            _ => Err(CoreError::Validation(format!(
                "Invalid consensus status '{s}'. Must be one of: {}",
                VALID_CONSENSUS_STATUSES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a confidence level is finite and within `[0, 10]`.
pub fn validate_confidence_level(level: f64) -> Result<(), CoreError> {
    if !level.is_finite() {
        return Err(CoreError::Validation(
            "confidence level must be a finite number".to_string(),
        ));
    }
    if !(MIN_CONFIDENCE_LEVEL..=MAX_CONFIDENCE_LEVEL).contains(&level) {
        return Err(CoreError::Validation(format!(
            "confidence level must be between {MIN_CONFIDENCE_LEVEL} and {MAX_CONFIDENCE_LEVEL}, got {level}"
        )));
    }
    Ok(())
}

/// Validate the stored `shapes` payload: it must be a JSON array of objects.
///
/// Individual shape geometry is not checked here; the detector tolerates
/// malformed entries and skips them.
pub fn validate_shapes_json(json: &serde_json::Value) -> Result<(), CoreError> {
    let arr = json
        .as_array()
        .ok_or_else(|| CoreError::Validation("shapes must be a JSON array".to_string()))?;

    for (i, item) in arr.iter().enumerate() {
        if !item.is_object() {
            return Err(CoreError::Validation(format!(
                "shapes[{i}] must be a JSON object"
            )));
        }
    }
    Ok(())
}
