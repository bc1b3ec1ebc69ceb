//! Discrepancy detection across reviewers' annotations on one study.
//!
//! Three independent checks feed one report:
//! - finding mismatch: more than one distinct finding label in the set;
//! - spatial overlap: two annotations with different findings whose regions
//!   overlap;
//! - confidence variance: reviewers agreeing on a finding but spreading their
//!   confidence by more than [`CONFIDENCE_STD_DEV_THRESHOLD`].
//!
//! Malformed shapes and non-finite confidence values are logged and skipped;
//! they never abort the computation for the rest of the set.

use indexmap::IndexMap;
use serde::Serialize;

use crate::annotation::ReviewedAnnotation;
use crate::geometry::{parse_shapes, shapes_overlap, Shape};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Population standard deviation (on the 0-10 confidence scale) above which
/// reviewers sharing a finding are flagged.
pub const CONFIDENCE_STD_DEV_THRESHOLD: f64 = 2.0;

/// Fewer annotations than this cannot disagree.
pub const MIN_ANNOTATIONS_FOR_COMPARISON: usize = 2;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One detected disagreement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Discrepancy {
    /// Reviewers used different finding labels.
    FindingMismatch { findings: Vec<String> },

    /// Two annotations with different findings cover overlapping regions.
    SpatialOverlap {
        annotation_ids: [DbId; 2],
        findings: [String; 2],
        reviewer_ids: [DbId; 2],
    },

    /// Reviewers agree on the finding but not on how sure they are.
    ConfidenceVariance {
        finding: String,
        mean: f64,
        standard_deviation: f64,
        annotation_ids: Vec<DbId>,
        reviewer_ids: Vec<DbId>,
        confidence_values: Vec<f64>,
    },
}

/// Result of [`detect_discrepancies`].
///
/// `total_annotations` and `unique_findings` are absent when fewer than two
/// annotations were supplied, matching the historical wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyReport {
    pub consensus_possible: bool,
    pub discrepancies: Vec<Discrepancy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_annotations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_findings: Option<Vec<String>>,
}

impl DiscrepancyReport {
    fn trivial() -> Self {
        Self {
            consensus_possible: true,
            discrepancies: Vec::new(),
            total_annotations: None,
            unique_findings: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Detect disagreements among a study's annotations.
pub fn detect_discrepancies<A: ReviewedAnnotation>(annotations: &[A]) -> DiscrepancyReport {
    if annotations.len() < MIN_ANNOTATIONS_FOR_COMPARISON {
        return DiscrepancyReport::trivial();
    }

    let unique_findings = distinct_findings(annotations);

    let mut discrepancies = Vec::new();
    if unique_findings.len() > 1 {
        discrepancies.push(Discrepancy::FindingMismatch {
            findings: unique_findings.clone(),
        });
    }
    discrepancies.extend(detect_spatial_overlaps(annotations));
    discrepancies.extend(detect_confidence_variance(annotations));

    DiscrepancyReport {
        consensus_possible: discrepancies.is_empty(),
        discrepancies,
        total_annotations: Some(annotations.len()),
        unique_findings: Some(unique_findings),
    }
}

/// Distinct normalized findings in first-seen order.
pub fn distinct_findings<A: ReviewedAnnotation>(annotations: &[A]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for ann in annotations {
        let finding = ann.normalized_finding();
        if !seen.iter().any(|f| f == finding) {
            seen.push(finding.to_string());
        }
    }
    seen
}

/// One entry per unordered pair (i < j) with differing findings whose regions
/// overlap. Only the first overlapping shape pair matters.
pub fn detect_spatial_overlaps<A: ReviewedAnnotation>(annotations: &[A]) -> Vec<Discrepancy> {
    let shapes: Vec<Vec<Shape>> = annotations.iter().map(usable_shapes).collect();

    let mut found = Vec::new();
    for i in 0..annotations.len() {
        for j in (i + 1)..annotations.len() {
            let (a, b) = (&annotations[i], &annotations[j]);
            if a.normalized_finding() == b.normalized_finding() {
                continue;
            }

            let overlapping = shapes[i]
                .iter()
                .any(|sa| shapes[j].iter().any(|sb| shapes_overlap(sa, sb)));

            if overlapping {
                found.push(Discrepancy::SpatialOverlap {
                    annotation_ids: [a.id(), b.id()],
                    findings: [
                        a.normalized_finding().to_string(),
                        b.normalized_finding().to_string(),
                    ],
                    reviewer_ids: [a.reviewer_id(), b.reviewer_id()],
                });
            }
        }
    }
    found
}

/// One entry per finding shared by at least two annotations whose confidence
/// spread exceeds [`CONFIDENCE_STD_DEV_THRESHOLD`].
pub fn detect_confidence_variance<A: ReviewedAnnotation>(annotations: &[A]) -> Vec<Discrepancy> {
    let mut groups: IndexMap<&str, Vec<&A>> = IndexMap::new();
    for ann in annotations {
        groups.entry(ann.normalized_finding()).or_default().push(ann);
    }

    let mut found = Vec::new();
    for (finding, members) in groups {
        if members.len() < MIN_ANNOTATIONS_FOR_COMPARISON {
            continue;
        }

        let contributing: Vec<&A> = members
            .into_iter()
            .filter(|ann| {
                let finite = ann.confidence_level().is_finite();
                if !finite {
                    tracing::warn!(
                        annotation_id = ann.id(),
                        finding,
                        "Skipping non-finite confidence level"
                    );
                }
                finite
            })
            .collect();

        if contributing.len() < MIN_ANNOTATIONS_FOR_COMPARISON {
            continue;
        }

        let values: Vec<f64> = contributing.iter().map(|a| a.confidence_level()).collect();
        let (mean, standard_deviation) = mean_and_std_dev(&values);

        if standard_deviation > CONFIDENCE_STD_DEV_THRESHOLD {
            found.push(Discrepancy::ConfidenceVariance {
                finding: finding.to_string(),
                mean,
                standard_deviation,
                annotation_ids: contributing.iter().map(|a| a.id()).collect(),
                reviewer_ids: contributing.iter().map(|a| a.reviewer_id()).collect(),
                confidence_values: values,
            });
        }
    }
    found
}

/// Mean and population standard deviation. Empty input yields `(0.0, 0.0)`.
pub fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Parse an annotation's shapes, logging and dropping the ones that do not
/// parse.
fn usable_shapes<A: ReviewedAnnotation>(ann: &A) -> Vec<Shape> {
    let raw = ann.shapes();
    if !raw.is_array() && !raw.is_null() {
        tracing::warn!(annotation_id = ann.id(), "Annotation shapes are not an array");
    }

    parse_shapes(raw)
        .into_iter()
        .enumerate()
        .filter_map(|(index, parsed)| match parsed {
            Ok(shape) => Some(shape),
            Err(e) => {
                tracing::warn!(
                    annotation_id = ann.id(),
                    shape_index = index,
                    error = %e,
                    "Ignoring malformed shape"
                );
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
