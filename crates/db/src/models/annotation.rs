//! Reviewer annotation model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use radreview_core::annotation::ReviewedAnnotation;
use radreview_core::types::{DbId, Timestamp};

/// A row from the `annotations` table.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: DbId,
    pub study_uid: String,
    pub series_uid: Option<String>,
    pub instance_uid: Option<String>,
    pub reviewer_id: DbId,
    pub finding: Option<String>,
    pub confidence_level: f64,
    pub notes: Option<String>,
    pub shapes: serde_json::Value,
    pub consensus_status: String,
    pub consensus_score: f64,
    pub is_consensus_result: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ReviewedAnnotation for Annotation {
    fn id(&self) -> DbId {
        self.id
    }

    fn reviewer_id(&self) -> DbId {
        self.reviewer_id
    }

    fn finding(&self) -> Option<&str> {
        self.finding.as_deref()
    }

    fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    fn shapes(&self) -> &serde_json::Value {
        &self.shapes
    }
}

/// DTO for creating an annotation. The study comes from the path and the
/// reviewer from the access token.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnotation {
    pub series_uid: Option<String>,
    pub instance_uid: Option<String>,
    #[validate(length(max = 255))]
    pub finding: Option<String>,
    #[validate(range(min = 0.0, max = 10.0))]
    pub confidence_level: f64,
    pub notes: Option<String>,
    pub shapes: Option<serde_json::Value>,
}

/// DTO for updating an annotation. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnotation {
    #[validate(length(max = 255))]
    pub finding: Option<String>,
    #[validate(range(min = 0.0, max = 10.0))]
    pub confidence_level: Option<f64>,
    pub notes: Option<String>,
    pub shapes: Option<serde_json::Value>,
    pub consensus_status: Option<String>,
}
