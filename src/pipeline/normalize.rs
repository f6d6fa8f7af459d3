// Record normalization: candidate JSON values to typed ClinicalRecord fields.
// Tolerant boundary: null-like tokens become Absent, numeric-looking strings
// are coerced, anything else that cannot be read is left Absent.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{ClinicalRecord, Field, PupilState, VasoactiveDrug};
use crate::pipeline::extraction::CandidateRecord;

/// String values that mean "not stated", compared after trim + lowercase.
const ABSENT_TOKENS: &[&str] = &[
    "", "-", "null", "none", "nan", "n/a", "na", "nil", "undefined", "unknown",
    "not reported", "not mentioned", "not available", "not stated",
];

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[<>~≈]?\s*([-+]?\d[\d,]*(?:\.\d+)?|[-+]?\.\d+)").expect("static number pattern")
});

/// Convert a parsed candidate into a typed record.
pub fn normalize(candidate: CandidateRecord) -> ClinicalRecord {
    let mut record = ClinicalRecord::new(candidate.patient_id);
    let get = |key: &str| candidate.get(key);

    record.age_months = age_field(get("age"));
    record.fio2 = fio2_field(get("fio2"));
    record.pao2 = number_field(get("pao2"));
    record.spo2 = number_field(get("spo2"));
    record.ventilated = flag_field(get("vent"));
    record.gcs_total = integer_field(get("gcs_total"));
    record.pupil_state = pupil_field(get("pupil"));
    record.platelets = count_field(get("platelets"), PLATELETS_PER_UL_FROM);
    record.inr = number_field(get("inr"));
    record.d_dimer = number_field(get("d_dimer"));
    record.fibrinogen = number_field(get("fibrinogen"));
    record.sbp = number_field(get("sbp"));
    record.dbp = number_field(get("dbp"));
    record.lactate = number_field(get("lactate"));

    for drug in VasoactiveDrug::ALL {
        *record.vasoactives.get_mut(drug) = flag_field(get(drug.as_str()));
    }

    record.glucose = number_field(get("glucose"));
    record.anc = count_field(get("anc"), DIFFERENTIAL_PER_UL_FROM);
    record.alc = count_field(get("alc"), DIFFERENTIAL_PER_UL_FROM);
    record.creatinine = number_field(get("creatinine"));
    record.bilirubin = number_field(get("bilirubin"));
    record.alt = number_field(get("alt"));

    let aux = &mut record.auxiliary;
    aux.wbc = count_field(get("wbc"), WBC_PER_UL_FROM);
    aux.neutrophil_pct = number_field(get("neutrophil_pct"));
    aux.bands_pct = number_field(get("bands_pct"));
    aux.gcs_eye = integer_field(get("gcs_eye"));
    aux.gcs_verbal = integer_field(get("gcs_verbal"));
    aux.gcs_motor = integer_field(get("gcs_motor"));
    aux.pao2_kpa = number_field(get("pao2_kpa"));

    tracing::debug!(
        patient_id = record.patient_id(),
        "Candidate record normalized"
    );

    record
}

/// True for JSON null and null-like strings.
pub fn is_absent_marker(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => ABSENT_TOKENS.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

/// Read a finite number from a JSON number or the leading number of a string.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => leading_number(s)?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn leading_number(text: &str) -> Option<f64> {
    let caps = LEADING_NUMBER.captures(text.trim())?;
    caps[1].replace(',', "").parse().ok()
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !is_absent_marker(v))
}

fn number_field(value: Option<&Value>) -> Field<f64> {
    match present(value).and_then(coerce_number) {
        Some(n) => Field::Observed(n),
        None => Field::Absent,
    }
}

/// Smallest platelet value read as per mm³. Cut-offs sit above the
/// physiologic ceiling in thousand/mm³ so that critically low per-mm³ counts
/// still land in the scoring range.
const PLATELETS_PER_UL_FROM: f64 = 2_000.0;

/// ANC and ALC never reach 100 thousand/mm³.
const DIFFERENTIAL_PER_UL_FROM: f64 = 100.0;

/// Hyperleukocytosis can pass 100 thousand/mm³, so WBC keeps a higher cut.
const WBC_PER_UL_FROM: f64 = 500.0;

/// Cell counts are thousand/mm³; values at or above `per_ul_from` were
/// written per mm³ and are scaled down.
fn count_field(value: Option<&Value>, per_ul_from: f64) -> Field<f64> {
    match number_field(value) {
        Field::Observed(n) if n >= per_ul_from => Field::Observed(n / 1000.0),
        other => other,
    }
}

/// Plain numbers are months; strings may carry a unit ("6 years", "18 mo").
fn age_field(value: Option<&Value>) -> Field<f64> {
    let Some(value) = present(value) else {
        return Field::Absent;
    };
    let Some(n) = coerce_number(value) else {
        return Field::Absent;
    };
    let months = match value {
        Value::String(s) => {
            let unit = s
                .trim()
                .trim_start_matches(|c: char| !c.is_alphabetic())
                .to_lowercase();
            if unit.starts_with('y') {
                n * 12.0
            } else if unit.starts_with('w') {
                n * 7.0 / 30.44
            } else if unit.starts_with('d') {
                n / 30.44
            } else {
                n
            }
        }
        _ => n,
    };
    Field::Observed(months)
}

/// Percentages in (1, 100] are read as percent and rescaled to a fraction.
fn fio2_field(value: Option<&Value>) -> Field<f64> {
    match number_field(value) {
        Field::Observed(n) if n > 1.0 && n <= 100.0 => Field::Observed(n / 100.0),
        other => other,
    }
}

fn flag_field(value: Option<&Value>) -> Field<bool> {
    let Some(value) = present(value) else {
        return Field::Absent;
    };
    let flag = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "1.0" | "yes" | "y" | "true" | "on" => Some(true),
            "0" | "0.0" | "no" | "n" | "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    flag.map_or(Field::Absent, Field::Observed)
}

/// Whole numbers only; a fractional score is invalid rather than rounded.
fn integer_field(value: Option<&Value>) -> Field<u8> {
    let Some(value) = present(value) else {
        return Field::Absent;
    };
    let Some(n) = coerce_number(value) else {
        return Field::Absent;
    };
    if n.fract() != 0.0 {
        return Field::invalid(n, "not a whole number");
    }
    if !(0.0..=f64::from(u8::MAX)).contains(&n) {
        return Field::invalid(n, "out of range");
    }
    Field::Observed(n as u8)
}

fn pupil_field(value: Option<&Value>) -> Field<PupilState> {
    match present(value) {
        Some(Value::String(s)) => PupilState::parse_lenient(s).map_or(Field::Absent, Field::Observed),
        _ => Field::Absent,
    }
}
