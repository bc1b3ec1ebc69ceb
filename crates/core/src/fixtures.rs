//! Shared annotation fixtures for unit tests.

use serde_json::json;

use crate::annotation::ReviewedAnnotation;
use crate::types::DbId;

#[derive(Debug, Clone)]
pub struct Fixture {
    pub id: DbId,
    pub reviewer_id: DbId,
    pub finding: Option<String>,
    pub confidence_level: f64,
    pub shapes: serde_json::Value,
}

impl ReviewedAnnotation for Fixture {
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

/// Annotation with no shapes.
pub fn ann(id: DbId, reviewer_id: DbId, finding: Option<&str>, confidence: f64) -> Fixture {
    Fixture {
        id,
        reviewer_id,
        finding: finding.map(str::to_string),
        confidence_level: confidence,
        shapes: json!([]),
    }
}

/// Annotation with the given shapes array.
pub fn ann_with_shapes(
    id: DbId,
    reviewer_id: DbId,
    finding: Option<&str>,
    shapes: serde_json::Value,
) -> Fixture {
    Fixture {
        shapes,
        ..ann(id, reviewer_id, finding, 5.0)
    }
}

pub fn rect_json(sx: f64, sy: f64, ex: f64, ey: f64) -> serde_json::Value {
    json!({"tool": "rectangle", "startX": sx, "startY": sy, "endX": ex, "endY": ey})
}

pub fn circle_json(sx: f64, sy: f64, ex: f64, ey: f64) -> serde_json::Value {
    json!({"tool": "circle", "startX": sx, "startY": sy, "endX": ex, "endY": ey})
}
