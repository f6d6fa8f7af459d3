use std::collections::BTreeMap;

use crate::models::{ClinicalRecord, OrganDomain, ScoreVariant};

use super::domains;
use super::types::{DomainScore, SeverityScore};

/// 4-domain Phoenix score: respiratory, cardiovascular, coagulation, neurologic.
///
/// Uses the ungated SpO2:FiO2 ratio and the `fixed` pupil indicator.
pub fn phoenix_score(record: &ClinicalRecord) -> SeverityScore {
    score(record, ScoreVariant::Phoenix)
}

/// 8-domain Phoenix score: the four core domains plus endocrine,
/// immunologic, renal and hepatic.
///
/// Uses the SpO2:FiO2 ratio gated on SpO2 ≤ 97 and requires both pupils fixed.
pub fn phoenix8_score(record: &ClinicalRecord) -> SeverityScore {
    score(record, ScoreVariant::Phoenix8)
}

pub fn score(record: &ClinicalRecord, variant: ScoreVariant) -> SeverityScore {
    let domains: BTreeMap<OrganDomain, DomainScore> = variant
        .domains()
        .iter()
        .map(|domain| (*domain, domain_score(record, variant, *domain)))
        .collect();

    let score = SeverityScore::from_domains(variant, domains);
    tracing::debug!(
        patient_id = record.patient_id(),
        variant = %variant,
        total = score.total,
        sepsis = score.sepsis,
        septic_shock = score.septic_shock,
        missing = ?score.missing_inputs(),
        "Severity score computed"
    );
    score
}

fn domain_score(record: &ClinicalRecord, variant: ScoreVariant, domain: OrganDomain) -> DomainScore {
    let eight = variant == ScoreVariant::Phoenix8;
    match domain {
        OrganDomain::Respiratory if eight => {
            domains::respiratory(record, &record.derived.sf_ratio_gated, "sf_ratio_gated")
        }
        OrganDomain::Respiratory => {
            domains::respiratory(record, &record.derived.sf_ratio, "sf_ratio")
        }
        OrganDomain::Cardiovascular => domains::cardiovascular(record),
        OrganDomain::Coagulation => domains::coagulation(record),
        OrganDomain::Neurologic => domains::neurologic(record, eight),
        OrganDomain::Endocrine => domains::endocrine(record),
        OrganDomain::Immunologic => domains::immunologic(record),
        OrganDomain::Renal => domains::renal(record),
        OrganDomain::Hepatic => domains::hepatic(record),
    }
}
