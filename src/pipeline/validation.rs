// Range validation for normalized records.
// Applied between normalize() and derive(). Out-of-range values are
// discarded (field becomes Invalid); the record itself is never rejected.

use serde::Serialize;
use thiserror::Error;

use crate::models::{ClinicalRecord, Field};

/// A field that was discarded, with the offending value.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{field} = {value}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

struct Rule {
    field: &'static str,
    accepts: fn(f64) -> bool,
    reason: &'static str,
}

fn is_non_negative(v: f64) -> bool {
    v >= 0.0
}

fn is_percent(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

fn rule(field: &'static str, accepts: fn(f64) -> bool, reason: &'static str) -> Rule {
    Rule {
        field,
        accepts,
        reason,
    }
}

fn non_negative(field: &'static str) -> Rule {
    rule(field, is_non_negative, "must not be negative")
}

/// Validate every range-constrained field in place.
///
/// Returns one error per discarded field, including fields the normalizer
/// had already marked invalid.
pub fn validate_record(record: &mut ClinicalRecord) -> Vec<ValidationError> {
    let mut issues = Vec::new();
    let patient_id = record.patient_id();

    {
        let mut check = |field: &mut Field<f64>, rule: Rule| apply(field, &rule, &mut issues);

        check(
            &mut record.age_months,
            rule("age_months", |v| (0.0..300.0).contains(&v), "outside [0, 300) months"),
        );
        check(
            &mut record.fio2,
            rule("fio2", |v| v > 0.0 && v <= 1.0, "outside (0, 1]"),
        );
        check(&mut record.pao2, non_negative("pao2"));
        check(&mut record.spo2, rule("spo2", is_percent, "outside [0, 100]"));
        check(&mut record.platelets, non_negative("platelets"));
        check(&mut record.inr, non_negative("inr"));
        check(&mut record.d_dimer, non_negative("d_dimer"));
        check(&mut record.fibrinogen, non_negative("fibrinogen"));
        check(&mut record.sbp, non_negative("sbp"));
        check(&mut record.dbp, non_negative("dbp"));
        check(&mut record.lactate, non_negative("lactate"));
        check(&mut record.glucose, non_negative("glucose"));
        check(&mut record.anc, non_negative("anc"));
        check(&mut record.alc, non_negative("alc"));
        check(&mut record.creatinine, non_negative("creatinine"));
        check(&mut record.bilirubin, non_negative("bilirubin"));
        check(&mut record.alt, non_negative("alt"));

        let aux = &mut record.auxiliary;
        check(&mut aux.wbc, non_negative("wbc"));
        check(&mut aux.neutrophil_pct, rule("neutrophil_pct", is_percent, "outside [0, 100]"));
        check(&mut aux.bands_pct, rule("bands_pct", is_percent, "outside [0, 100]"));
        check(&mut aux.pao2_kpa, non_negative("pao2_kpa"));
    }

    {
        let mut check = |field: &mut Field<u8>, rule: Rule| apply(field, &rule, &mut issues);

        check(
            &mut record.gcs_total,
            rule("gcs_total", |v| (3.0..=15.0).contains(&v), "outside [3, 15]"),
        );
        let aux = &mut record.auxiliary;
        check(
            &mut aux.gcs_eye,
            rule("gcs_eye", |v| (1.0..=4.0).contains(&v), "outside [1, 4]"),
        );
        check(
            &mut aux.gcs_verbal,
            rule("gcs_verbal", |v| (1.0..=5.0).contains(&v), "outside [1, 5]"),
        );
        check(
            &mut aux.gcs_motor,
            rule("gcs_motor", |v| (1.0..=6.0).contains(&v), "outside [1, 6]"),
        );
    }

    for issue in &issues {
        tracing::warn!(
            patient_id,
            field = issue.field,
            value = %issue.value,
            reason = %issue.reason,
            "Field discarded by validation"
        );
    }

    issues
}

fn apply<T>(field: &mut Field<T>, rule: &Rule, issues: &mut Vec<ValidationError>)
where
    T: Copy + Into<f64> + ToString,
{
    match field {
        Field::Invalid { raw, reason } => issues.push(ValidationError {
            field: rule.field,
            value: raw.clone(),
            reason: reason.clone(),
        }),
        Field::Observed(v) | Field::Derived(v) => {
            let value = *v;
            if !(rule.accepts)(value.into()) {
                issues.push(ValidationError {
                    field: rule.field,
                    value: value.to_string(),
                    reason: rule.reason.to_string(),
                });
                *field = Field::invalid(value, rule.reason);
            }
        }
        Field::Absent => {}
    }
}
