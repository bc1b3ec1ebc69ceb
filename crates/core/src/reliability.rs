//! Inter-rater reliability over a study's annotations.
//!
//! Reviewers are compared by the set of distinct findings each one reported.
//! The percentage is pairwise set agreement; the coefficient that drives the
//! reliability level is chosen by [`AgreementCoefficient`].

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::annotation::ReviewedAnnotation;
use crate::discrepancy::MIN_ANNOTATIONS_FOR_COMPARISON;
use crate::error::CoreError;
use crate::types::DbId;

/// Denominators closer to zero than this are treated as zero chance
/// disagreement.
const CHANCE_EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// AgreementCoefficient
// ---------------------------------------------------------------------------

/// Which chance-corrected coefficient fills `kappa`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementCoefficient {
    /// Constant `0.0`. Keeps reports stable for existing consumers.
    #[default]
    Disabled,
    /// Fleiss' kappa over the reviewer x finding presence matrix.
    FleissKappa,
}

const VALID_COEFFICIENTS: &[&str] = &["disabled", "fleiss_kappa"];

impl AgreementCoefficient {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::FleissKappa => "fleiss_kappa",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "fleiss_kappa" => Ok(Self::FleissKappa),
            _ => Err(CoreError::Validation(format!(
                "Invalid agreement coefficient '{s}'. Must be one of: {}",
                VALID_COEFFICIENTS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ReliabilityLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityLevel {
    Perfect,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Moderate,
    Fair,
    Poor,
}

impl ReliabilityLevel {
    /// Step mapping from a coefficient value. `Perfect` is reserved for the
    /// trivial single-annotation case and never produced here.
    pub fn from_coefficient(kappa: f64) -> Self {
        if kappa > 0.8 {
            Self::VeryGood
        } else if kappa > 0.6 {
            Self::Good
        } else if kappa > 0.4 {
            Self::Moderate
        } else if kappa > 0.2 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perfect => "Perfect",
            Self::VeryGood => "Very Good",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityReport {
    pub agreement_percent: f64,
    pub reliability_level: ReliabilityLevel,
    pub reviewer_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kappa: Option<f64>,
}

impl ReliabilityReport {
    fn trivial() -> Self {
        Self {
            agreement_percent: 100.0,
            reliability_level: ReliabilityLevel::Perfect,
            reviewer_count: 1,
            kappa: None,
        }
    }
}

/// Compute agreement between the reviewers behind `annotations`.
pub fn calculate_reliability<A: ReviewedAnnotation>(
    annotations: &[A],
    coefficient: AgreementCoefficient,
) -> ReliabilityReport {
    if annotations.len() < MIN_ANNOTATIONS_FOR_COMPARISON {
        return ReliabilityReport::trivial();
    }

    let by_reviewer = findings_by_reviewer(annotations);
    let kappa = match coefficient {
        AgreementCoefficient::Disabled => 0.0,
        AgreementCoefficient::FleissKappa => fleiss_kappa(&by_reviewer),
    };

    ReliabilityReport {
        agreement_percent: pairwise_agreement_percent(&by_reviewer),
        reliability_level: ReliabilityLevel::from_coefficient(kappa),
        reviewer_count: by_reviewer.len(),
        kappa: Some(kappa),
    }
}

/// Reviewer to distinct normalized findings, both in first-seen order.
pub fn findings_by_reviewer<A: ReviewedAnnotation>(
    annotations: &[A],
) -> IndexMap<DbId, IndexSet<String>> {
    let mut map: IndexMap<DbId, IndexSet<String>> = IndexMap::new();
    for ann in annotations {
        map.entry(ann.reviewer_id())
            .or_default()
            .insert(ann.normalized_finding().to_string());
    }
    map
}

/// `100 * sum |A ∩ B| / sum max(|A|, |B|)` over unordered reviewer pairs.
/// Zero when there is nothing to compare.
pub fn pairwise_agreement_percent(by_reviewer: &IndexMap<DbId, IndexSet<String>>) -> f64 {
    let sets: Vec<&IndexSet<String>> = by_reviewer.values().collect();

    let mut agreements = 0usize;
    let mut comparisons = 0usize;
    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            agreements += sets[i].intersection(sets[j]).count();
            comparisons += sets[i].len().max(sets[j].len());
        }
    }

    if comparisons == 0 {
        return 0.0;
    }
    100.0 * agreements as f64 / comparisons as f64
}

/// Fleiss' kappa with each distinct finding as a subject and every reviewer
/// rating it present or absent.
///
/// A single reviewer has no one to agree with and scores 0.0.
pub fn fleiss_kappa(by_reviewer: &IndexMap<DbId, IndexSet<String>>) -> f64 {
    let n_raters = by_reviewer.len();
    if n_raters < 2 {
        return 0.0;
    }

    let subjects: IndexSet<&str> = by_reviewer
        .values()
        .flat_map(|set| set.iter().map(String::as_str))
        .collect();
    if subjects.is_empty() {
        return 1.0;
    }

    let n = n_raters as f64;
    let mut p_bar = 0.0;
    let mut present_total = 0.0;

    for subject in &subjects {
        let present = by_reviewer
            .values()
            .filter(|set| set.contains(*subject))
            .count() as f64;
        let absent = n - present;

        p_bar += (present * present + absent * absent - n) / (n * (n - 1.0));
        present_total += present;
    }

    let n_subjects = subjects.len() as f64;
    p_bar /= n_subjects;

    let p_present = present_total / (n_subjects * n);
    let p_absent = 1.0 - p_present;
    let p_e = p_present * p_present + p_absent * p_absent;

    if (1.0 - p_e).abs() < CHANCE_EPSILON {
        return 1.0;
    }
    (p_bar - p_e) / (1.0 - p_e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ann, Fixture};
    use serde_json::json;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn single_annotation_is_perfect() {
        let report = calculate_reliability(
            &[ann(1, 10, Some("Nodule"), 5.0)],
            AgreementCoefficient::FleissKappa,
        );
        assert_eq!(report.agreement_percent, 100.0);
        assert_eq!(report.reliability_level, ReliabilityLevel::Perfect);
        assert_eq!(report.reviewer_count, 1);
        assert_eq!(report.kappa, None);
    }

    #[test]
    fn empty_set_is_perfect() {
        let report = calculate_reliability::<Fixture>(&[], AgreementCoefficient::Disabled);
        assert_eq!(report.reliability_level, ReliabilityLevel::Perfect);
    }

    #[test]
    fn disabled_coefficient_reports_zero_and_poor() {
        let report = calculate_reliability(
            &[ann(1, 10, Some("Nodule"), 5.0), ann(2, 11, Some("Nodule"), 5.0)],
            AgreementCoefficient::Disabled,
        );
        assert_eq!(report.agreement_percent, 100.0);
        assert_eq!(report.kappa, Some(0.0));
        assert_eq!(report.reliability_level, ReliabilityLevel::Poor);
        assert_eq!(report.reviewer_count, 2);
    }

    #[test]
    fn unanimous_reviewers_have_kappa_one() {
        let report = calculate_reliability(
            &[ann(1, 10, Some("Nodule"), 5.0), ann(2, 11, Some("Nodule"), 9.0)],
            AgreementCoefficient::FleissKappa,
        );
        assert_eq!(report.kappa, Some(1.0));
        assert_eq!(report.reliability_level, ReliabilityLevel::VeryGood);
    }

    #[test]
    fn complete_disagreement_is_poor() {
        let report = calculate_reliability(
            &[ann(1, 10, Some("Nodule"), 5.0), ann(2, 11, Some("Mass"), 5.0)],
            AgreementCoefficient::FleissKappa,
        );
        assert_eq!(report.agreement_percent, 0.0);
        assert!(close(report.kappa.unwrap(), -1.0));
        assert_eq!(report.reliability_level, ReliabilityLevel::Poor);
    }

    #[test]
    fn partial_agreement_across_three_reviewers() {
        let report = calculate_reliability(
            &[
                ann(1, 10, Some("A"), 5.0),
                ann(2, 10, Some("B"), 5.0),
                ann(3, 11, Some("A"), 5.0),
                ann(4, 12, Some("A"), 5.0),
            ],
            AgreementCoefficient::FleissKappa,
        );
        assert!(close(report.agreement_percent, 60.0));
        assert!(close(report.kappa.unwrap(), 0.25));
        assert_eq!(report.reliability_level, ReliabilityLevel::Fair);
        assert_eq!(report.reviewer_count, 3);
    }

    #[test]
    fn one_reviewer_many_annotations_has_no_comparisons() {
        let report = calculate_reliability(
            &[ann(1, 10, Some("A"), 5.0), ann(2, 10, Some("B"), 5.0)],
            AgreementCoefficient::FleissKappa,
        );
        assert_eq!(report.agreement_percent, 0.0);
        assert_eq!(report.kappa, Some(0.0));
        assert_eq!(report.reliability_level, ReliabilityLevel::Poor);
        assert_eq!(report.reviewer_count, 1);
    }

    #[test]
    fn null_findings_compare_as_unspecified() {
        let by_reviewer = findings_by_reviewer(&[ann(1, 10, None, 5.0), ann(2, 11, None, 5.0)]);
        assert!(by_reviewer[&10].contains("Unspecified"));
        assert_eq!(pairwise_agreement_percent(&by_reviewer), 100.0);
    }

    #[test]
    fn level_thresholds_are_strict() {
        assert_eq!(ReliabilityLevel::from_coefficient(0.81), ReliabilityLevel::VeryGood);
        assert_eq!(ReliabilityLevel::from_coefficient(0.8), ReliabilityLevel::Good);
        assert_eq!(ReliabilityLevel::from_coefficient(0.6), ReliabilityLevel::Moderate);
        assert_eq!(ReliabilityLevel::from_coefficient(0.4), ReliabilityLevel::Fair);
        assert_eq!(ReliabilityLevel::from_coefficient(0.2), ReliabilityLevel::Poor);
        assert_eq!(ReliabilityLevel::from_coefficient(-0.5), ReliabilityLevel::Poor);
    }

    #[test]
    fn coefficient_parses_from_config_values() {
        assert_eq!(
            AgreementCoefficient::from_str("fleiss_kappa").unwrap(),
            AgreementCoefficient::FleissKappa
        );
        assert_eq!(AgreementCoefficient::default(), AgreementCoefficient::Disabled);
        assert!(AgreementCoefficient::from_str("cohen").is_err());
    }

    #[test]
    fn report_wire_format() {
        let trivial = serde_json::to_value(ReliabilityReport::trivial()).unwrap();
        assert_eq!(
            trivial,
            json!({"agreementPercent": 100.0, "reliabilityLevel": "Perfect", "reviewerCount": 1})
        );

        let level = serde_json::to_value(ReliabilityLevel::VeryGood).unwrap();
        assert_eq!(level, json!("Very Good"));
    }
}
