//! Diagnostic report combining the detector and the calculator for one study.

use serde::Serialize;

use crate::annotation::ReviewedAnnotation;
use crate::discrepancy::{detect_discrepancies, Discrepancy};
use crate::reliability::{calculate_reliability, AgreementCoefficient, ReliabilityReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub study_uid: String,
    pub total_annotations: usize,
    pub consensus_possible: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub inter_rater_reliability: ReliabilityReport,
}

/// Build a report. Unlike the bare detector, `total_annotations` is always
/// present here.
pub fn generate_report<A: ReviewedAnnotation>(
    study_uid: &str,
    annotations: &[A],
    coefficient: AgreementCoefficient,
) -> DiagnosticReport {
    let analysis = detect_discrepancies(annotations);

    DiagnosticReport {
        study_uid: study_uid.to_string(),
        total_annotations: annotations.len(),
        consensus_possible: analysis.consensus_possible,
        discrepancies: analysis.discrepancies,
        inter_rater_reliability: calculate_reliability(annotations, coefficient),
    }
}
