use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::derivation::DerivationError;
use super::extraction::UsageSnapshot;
use super::validation::ValidationError;
use crate::models::{ClinicalRecord, FieldStatus};
use crate::scoring::SeverityScore;

/// One case to score: a narrative and the caller's identifier for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInput {
    #[serde(alias = "pid")]
    pub patient_id: i64,
    #[serde(alias = "vignette", alias = "text")]
    pub narrative: String,
}

/// Pipeline stage that raised a [`RecordIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStage {
    Validation,
    Derivation,
}

/// A field-local problem: the field was discarded or not derived, and the
/// case was still scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordIssue {
    pub stage: IssueStage,
    pub field: &'static str,
    pub message: String,
}

impl From<ValidationError> for RecordIssue {
    fn from(e: ValidationError) -> Self {
        Self {
            stage: IssueStage::Validation,
            field: e.field,
            message: e.to_string(),
        }
    }
}

impl From<DerivationError> for RecordIssue {
    fn from(e: DerivationError) -> Self {
        let field = match &e {
            DerivationError::ConflictingInputs { target, .. } => *target,
        };
        Self {
            stage: IssueStage::Derivation,
            field,
            message: e.to_string(),
        }
    }
}

/// Full result for one case.
///
/// `record` serializes as the flat key → number-or-null map; `provenance`
/// says for each key whether the value was observed, derived, absent or
/// discarded as invalid.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub run_id: Uuid,
    pub patient_id: i64,
    pub scored_at: DateTime<Utc>,
    pub record: ClinicalRecord,
    pub provenance: BTreeMap<&'static str, FieldStatus>,
    pub phoenix: SeverityScore,
    pub phoenix8: SeverityScore,
    pub issues: Vec<RecordIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSnapshot>,
}

impl ScoreReport {
    /// Keys whose value was discarded, with the reason.
    pub fn invalid_fields(&self) -> BTreeMap<&'static str, String> {
        self.record.invalid_fields()
    }
}
