//! Per-domain scoring rules.
//!
//! Each function reads only the fields its domain needs and returns a
//! [`DomainScore`]. Absent inputs contribute 0 points and are listed as
//! missing. Thresholds follow the Phoenix Sepsis Criteria; ages are in months.

use crate::models::{ClinicalRecord, Field, OrganDomain};

use super::types::DomainScore;

/// MAP cut-offs (mmHg) by age band: below `.0` scores 2, below `.1` scores 1.
const MAP_CUTS: [(f64, f64); 6] = [
    (17.0, 31.0),
    (25.0, 39.0),
    (31.0, 44.0),
    (32.0, 45.0),
    (36.0, 49.0),
    (38.0, 52.0),
];

/// Creatinine (mg/dL) at or above which the renal domain scores, by age band.
const CREATININE_CUTS: [f64; 6] = [0.8, 0.3, 0.4, 0.6, 0.7, 1.0];

/// Index into the age-banded tables: <1, 1-11, 12-23, 24-59, 60-143, ≥144 months.
pub fn age_band(age_months: f64) -> usize {
    match age_months {
        a if a < 1.0 => 0,
        a if a < 12.0 => 1,
        a if a < 24.0 => 2,
        a if a < 60.0 => 3,
        a if a < 144.0 => 4,
        _ => 5,
    }
}

/// Value of a field, noting it as missing when unusable.
fn read<T: Copy>(field: &Field<T>, name: &'static str, score: &mut DomainScore) -> Option<T> {
    let value = field.value();
    if value.is_none() {
        score.missing(name);
    }
    value
}

/// Respiratory (0-3).
///
/// `sf_ratio` is the SpO2:FiO2 variant the caller scores with; `sf_name`
/// is its name in the missing-input list.
pub fn respiratory(
    record: &ClinicalRecord,
    sf_ratio: &Field<f64>,
    sf_name: &'static str,
) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Respiratory);
    let pf = read(&record.derived.pf_ratio, "pf_ratio", &mut score);
    let sf = read(sf_ratio, sf_name, &mut score);
    let imv = read(&record.ventilated, "ventilated", &mut score) == Some(true);
    let other = read(
        &record.derived.other_respiratory_support,
        "other_respiratory_support",
        &mut score,
    ) == Some(true);

    let below = |pf_cut: f64, sf_cut: f64| {
        pf.is_some_and(|p| p < pf_cut) || sf.is_some_and(|s| s < sf_cut)
    };

    let points = if imv && below(100.0, 148.0) {
        3
    } else if imv && below(200.0, 220.0) {
        2
    } else if (imv || other) && below(400.0, 292.0) {
        1
    } else {
        0
    };
    score.add(points);
    score
}

/// Cardiovascular (0-6): vasoactives, lactate and age-banded MAP.
pub fn cardiovascular(record: &ClinicalRecord) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Cardiovascular);

    match read(&record.derived.vasoactive_count, "vasoactive_count", &mut score) {
        Some(n) if n >= 2 => score.add(2),
        Some(1) => score.add(1),
        _ => {}
    }

    match read(&record.lactate, "lactate", &mut score) {
        Some(l) if l >= 11.0 => score.add(2),
        Some(l) if l >= 5.0 => score.add(1),
        _ => {}
    }

    if let Some(map) = read(
        &record.derived.mean_arterial_pressure,
        "mean_arterial_pressure",
        &mut score,
    ) {
        if let Some(age) = read(&record.age_months, "age_months", &mut score) {
            let (severe, moderate) = MAP_CUTS[age_band(age)];
            if map < severe {
                score.add(2);
            } else if map < moderate {
                score.add(1);
            }
        }
    }

    score
}

/// Coagulation (0-2): one point per abnormal test, capped.
pub fn coagulation(record: &ClinicalRecord) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Coagulation);
    let abnormal = [
        read(&record.platelets, "platelets", &mut score).is_some_and(|v| v < 100.0),
        read(&record.inr, "inr", &mut score).is_some_and(|v| v > 1.3),
        read(&record.d_dimer, "d_dimer", &mut score).is_some_and(|v| v > 2.0),
        read(&record.fibrinogen, "fibrinogen", &mut score).is_some_and(|v| v < 100.0),
    ];
    for hit in abnormal {
        if hit {
            score.add(1);
        }
    }
    score
}

/// Neurologic (0-2): fixed pupils score 2, otherwise GCS ≤ 10 scores 1.
///
/// `require_both_fixed` selects the stricter bilateral indicator.
pub fn neurologic(record: &ClinicalRecord, require_both_fixed: bool) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Neurologic);
    let pupils = read(&record.pupil_state, "pupil_state", &mut score);
    let gcs = read(&record.gcs_total, "gcs_total", &mut score);

    let fixed = pupils.is_some_and(|p| {
        if require_both_fixed {
            p.is_both_fixed()
        } else {
            p.is_fixed()
        }
    });

    if fixed {
        score.add(2);
    } else if gcs.is_some_and(|g| g <= 10) {
        score.add(1);
    }
    score
}

/// Endocrine (0-1): hypo- or hyperglycemia.
pub fn endocrine(record: &ClinicalRecord) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Endocrine);
    if read(&record.glucose, "glucose", &mut score).is_some_and(|g| !(50.0..=150.0).contains(&g)) {
        score.add(1);
    }
    score
}

/// Immunologic (0-1): neutropenia or lymphopenia.
pub fn immunologic(record: &ClinicalRecord) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Immunologic);
    let low_anc = read(&record.anc, "anc", &mut score).is_some_and(|v| v < 0.5);
    let low_alc = read(&record.alc, "alc", &mut score).is_some_and(|v| v < 1.0);
    if low_anc || low_alc {
        score.add(1);
    }
    score
}

/// Renal (0-1): creatinine at or above the age-band cut.
pub fn renal(record: &ClinicalRecord) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Renal);
    if let Some(creatinine) = read(&record.creatinine, "creatinine", &mut score) {
        if let Some(age) = read(&record.age_months, "age_months", &mut score) {
            if creatinine >= CREATININE_CUTS[age_band(age)] {
                score.add(1);
            }
        }
    }
    score
}

/// Hepatic (0-1): total bilirubin ≥ 4 mg/dL or ALT > 102 IU/L.
pub fn hepatic(record: &ClinicalRecord) -> DomainScore {
    let mut score = DomainScore::new(OrganDomain::Hepatic);
    let bilirubin = read(&record.bilirubin, "bilirubin", &mut score).is_some_and(|v| v >= 4.0);
    let alt = read(&record.alt, "alt", &mut score).is_some_and(|v| v > 102.0);
    if bilirubin || alt {
        score.add(1);
    }
    score
}
