//! Derivation engine.
//!
//! Fills values that are only computable from other present fields. Every rule
//! fires only when its inputs are present and its target is absent, so
//! running [`derive`] twice leaves the record unchanged. Conflicting inputs
//! skip the dependent derivation and are reported, never miscomputed.

use serde::Serialize;
use thiserror::Error;

use crate::models::{ClinicalRecord, Field, VasoactiveDrug};

/// 1 kPa in mmHg.
const MMHG_PER_KPA: f64 = 7.50062;

/// FiO2 of room air; anything above means supplemental oxygen.
const ROOM_AIR_FIO2: f64 = 0.21;

/// Pulse oximetry above this is unreliable for the SpO2:FiO2 ratio.
const SF_SPO2_CEILING: f64 = 97.0;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum DerivationError {
    #[error("{target} not derived: {reason}")]
    ConflictingInputs { target: &'static str, reason: String },
}

impl DerivationError {
    fn conflict(target: &'static str, reason: impl Into<String>) -> Self {
        Self::ConflictingInputs {
            target,
            reason: reason.into(),
        }
    }
}

/// Apply every derivation rule to `record` in place.
pub fn derive(record: &mut ClinicalRecord) -> Vec<DerivationError> {
    let mut issues = Vec::new();

    derive_gcs_total(record);
    derive_pao2(record);
    if let Err(e) = derive_anc(record) {
        issues.push(e);
    }
    if let Err(e) = derive_alc(record) {
        issues.push(e);
    }
    if let Err(e) = derive_mean_arterial_pressure(record) {
        issues.push(e);
    }
    derive_oxygenation_ratios(record);
    derive_vasoactive_count(record);
    derive_other_respiratory_support(record);

    for issue in &issues {
        tracing::warn!(
            patient_id = record.patient_id(),
            error = %issue,
            "Derivation skipped"
        );
    }

    issues
}

fn set_derived<T>(target: &mut Field<T>, value: T, name: &str, patient_id: i64)
where
    T: std::fmt::Debug,
{
    tracing::debug!(patient_id, field = name, value = ?value, "Derived value");
    *target = Field::Derived(value);
}

/// GCS total from eye + verbal + motor when all three are present.
fn derive_gcs_total(record: &mut ClinicalRecord) {
    if !record.gcs_total.is_absent() {
        return;
    }
    let aux = &record.auxiliary;
    if let (Some(e), Some(v), Some(m)) = (
        aux.gcs_eye.value(),
        aux.gcs_verbal.value(),
        aux.gcs_motor.value(),
    ) {
        let pid = record.patient_id();
        let total = e.saturating_add(v).saturating_add(m);
        set_derived(&mut record.gcs_total, total, "gcs_total", pid);
    }
}

/// PaO2 in mmHg from a value reported in kPa.
fn derive_pao2(record: &mut ClinicalRecord) {
    if !record.pao2.is_absent() {
        return;
    }
    if let Some(kpa) = record.auxiliary.pao2_kpa.value() {
        let pid = record.patient_id();
        set_derived(&mut record.pao2, kpa * MMHG_PER_KPA, "pao2", pid);
    }
}

/// ANC = (segmented% [+ bands%]) × WBC / 100.
fn derive_anc(record: &mut ClinicalRecord) -> Result<(), DerivationError> {
    if !record.anc.is_absent() {
        return Ok(());
    }
    let aux = &record.auxiliary;
    let (Some(wbc), Some(segmented)) = (aux.wbc.value(), aux.neutrophil_pct.value()) else {
        return Ok(());
    };
    let percentage = segmented + aux.bands_pct.value().unwrap_or(0.0);
    if percentage > 100.0 {
        return Err(DerivationError::conflict(
            "anc",
            format!("neutrophil and band percentages sum to {percentage}"),
        ));
    }
    let pid = record.patient_id();
    set_derived(&mut record.anc, percentage * wbc / 100.0, "anc", pid);
    Ok(())
}

/// ALC = WBC − ANC when no direct lymphocyte count was stated.
fn derive_alc(record: &mut ClinicalRecord) -> Result<(), DerivationError> {
    if !record.alc.is_absent() {
        return Ok(());
    }
    let (Some(wbc), Some(anc)) = (record.auxiliary.wbc.value(), record.anc.value()) else {
        return Ok(());
    };
    if anc > wbc {
        return Err(DerivationError::conflict(
            "alc",
            format!("anc {anc} exceeds wbc {wbc}"),
        ));
    }
    let pid = record.patient_id();
    set_derived(&mut record.alc, wbc - anc, "alc", pid);
    Ok(())
}

/// MAP = DBP + (SBP − DBP) / 3.
fn derive_mean_arterial_pressure(record: &mut ClinicalRecord) -> Result<(), DerivationError> {
    if !record.derived.mean_arterial_pressure.is_absent() {
        return Ok(());
    }
    let (Some(sbp), Some(dbp)) = (record.sbp.value(), record.dbp.value()) else {
        return Ok(());
    };
    if sbp < dbp {
        return Err(DerivationError::conflict(
            "mean_arterial_pressure",
            format!("sbp {sbp} is below dbp {dbp}"),
        ));
    }
    let pid = record.patient_id();
    set_derived(
        &mut record.derived.mean_arterial_pressure,
        dbp + (sbp - dbp) / 3.0,
        "mean_arterial_pressure",
        pid,
    );
    Ok(())
}

/// PaO2:FiO2 and SpO2:FiO2 (plain and saturation-gated). A zero or absent
/// FiO2 leaves all three absent.
fn derive_oxygenation_ratios(record: &mut ClinicalRecord) {
    let Some(fio2) = record.fio2.value().filter(|f| *f > 0.0) else {
        return;
    };
    let pid = record.patient_id();
    let pao2 = record.pao2.value();
    let spo2 = record.spo2.value();
    let d = &mut record.derived;

    if d.pf_ratio.is_absent() {
        if let Some(pao2) = pao2 {
            set_derived(&mut d.pf_ratio, pao2 / fio2, "pf_ratio", pid);
        }
    }
    if let Some(spo2) = spo2 {
        if d.sf_ratio.is_absent() {
            set_derived(&mut d.sf_ratio, spo2 / fio2, "sf_ratio", pid);
        }
        if d.sf_ratio_gated.is_absent() && spo2 <= SF_SPO2_CEILING {
            set_derived(&mut d.sf_ratio_gated, spo2 / fio2, "sf_ratio_gated", pid);
        }
    }
}

/// Number of vasoactive drugs flagged as given. Left absent when no drug
/// flag was reported at all.
fn derive_vasoactive_count(record: &mut ClinicalRecord) {
    if !record.derived.vasoactive_count.is_absent() || !record.vasoactives.any_present() {
        return;
    }
    let count = VasoactiveDrug::ALL
        .iter()
        .filter(|drug| record.vasoactives.get(**drug).value() == Some(true))
        .count() as u8;
    let pid = record.patient_id();
    set_derived(
        &mut record.derived.vasoactive_count,
        count,
        "vasoactive_count",
        pid,
    );
}

fn derive_other_respiratory_support(record: &mut ClinicalRecord) {
    if !record.derived.other_respiratory_support.is_absent() {
        return;
    }
    if let Some(fio2) = record.fio2.value() {
        let pid = record.patient_id();
        set_derived(
            &mut record.derived.other_respiratory_support,
            fio2 > ROOM_AIR_FIO2,
            "other_respiratory_support",
            pid,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn pf_ratio_when_both_present() {
        let mut r = ClinicalRecord::new(1);
        r.pao2 = Field::Observed(90.0);
        r.fio2 = Field::Observed(0.45);
        derive(&mut r);
        assert!(approx(r.derived.pf_ratio.value(), 200.0));
        assert!(matches!(r.derived.pf_ratio, Field::Derived(_)));
    }

    #[test]
    fn pf_ratio_absent_when_input_absent() {
        let mut r = ClinicalRecord::new(1);
        r.pao2 = Field::Observed(90.0);
        derive(&mut r);
        assert!(r.derived.pf_ratio.is_absent());

        let mut r = ClinicalRecord::new(1);
        r.fio2 = Field::Observed(0.45);
        derive(&mut r);
        assert!(r.derived.pf_ratio.is_absent());
    }

    #[test]
    fn zero_fio2_yields_no_ratio() {
        let mut r = ClinicalRecord::new(1);
        r.pao2 = Field::Observed(90.0);
        r.spo2 = Field::Observed(90.0);
        r.fio2 = Field::Observed(0.0);
        derive(&mut r);
        assert!(r.derived.pf_ratio.is_absent());
        assert!(r.derived.sf_ratio.is_absent());
    }

    #[test]
    fn invalid_fio2_yields_no_ratio() {
        let mut r = ClinicalRecord::new(1);
        r.spo2 = Field::Observed(92.0);
        r.fio2 = Field::invalid(1.5, "outside (0, 1]");
        derive(&mut r);
        assert!(r.derived.sf_ratio.is_absent());
        assert!(r.derived.other_respiratory_support.is_absent());
    }

    #[test]
    fn anc_from_segmented_and_bands() {
        let mut r = ClinicalRecord::new(1);
        r.auxiliary.wbc = Field::Observed(8.0);
        r.auxiliary.neutrophil_pct = Field::Observed(40.0);
        r.auxiliary.bands_pct = Field::Observed(10.0);
        assert!(derive(&mut r).is_empty());
        assert!(approx(r.anc.value(), 4.0));
        assert!(approx(r.alc.value(), 4.0));
    }

    #[test]
    fn anc_from_single_percentage() {
        let mut r = ClinicalRecord::new(1);
        r.auxiliary.wbc = Field::Observed(10.0);
        r.auxiliary.neutrophil_pct = Field::Observed(60.0);
        derive(&mut r);
        assert!(approx(r.anc.value(), 6.0));
    }

    #[test]
    fn bands_alone_do_not_give_anc() {
        let mut r = ClinicalRecord::new(1);
        r.auxiliary.wbc = Field::Observed(10.0);
        r.auxiliary.bands_pct = Field::Observed(10.0);
        derive(&mut r);
        assert!(r.anc.is_absent());
        assert!(r.alc.is_absent());
    }

    #[test]
    fn stated_anc_is_not_overwritten() {
        let mut r = ClinicalRecord::new(1);
        r.anc = Field::Observed(0.3);
        r.auxiliary.wbc = Field::Observed(8.0);
        r.auxiliary.neutrophil_pct = Field::Observed(40.0);
        derive(&mut r);
        assert_eq!(r.anc, Field::Observed(0.3));
        assert!(approx(r.alc.value(), 7.7));
    }

    #[test]
    fn alc_conflict_is_reported() {
        let mut r = ClinicalRecord::new(1);
        r.anc = Field::Observed(9.0);
        r.auxiliary.wbc = Field::Observed(8.0);
        let issues = derive(&mut r);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            DerivationError::ConflictingInputs { target: "alc", .. }
        ));
        assert!(r.alc.is_absent());
    }

    #[test]
    fn percentage_sum_over_100_is_conflict() {
        let mut r = ClinicalRecord::new(1);
        r.auxiliary.wbc = Field::Observed(8.0);
        r.auxiliary.neutrophil_pct = Field::Observed(90.0);
        r.auxiliary.bands_pct = Field::Observed(20.0);
        let issues = derive(&mut r);
        assert!(matches!(
            &issues[0],
            DerivationError::ConflictingInputs { target: "anc", .. }
        ));
        assert!(r.anc.is_absent());
    }

    #[test]
    fn mean_arterial_pressure() {
        let mut r = ClinicalRecord::new(1);
        r.sbp = Field::Observed(100.0);
        r.dbp = Field::Observed(70.0);
        derive(&mut r);
        assert!(approx(r.derived.mean_arterial_pressure.value(), 80.0));
    }

    #[test]
    fn sbp_below_dbp_skips_map() {
        let mut r = ClinicalRecord::new(1);
        r.sbp = Field::Observed(60.0);
        r.dbp = Field::Observed(80.0);
        let issues = derive(&mut r);
        assert_eq!(issues.len(), 1);
        assert!(r.derived.mean_arterial_pressure.is_absent());
        assert!(issues[0].to_string().contains("mean_arterial_pressure"));
    }

    #[test]
    fn sf_ratio_gating() {
        let mut r = ClinicalRecord::new(1);
        r.spo2 = Field::Observed(98.0);
        r.fio2 = Field::Observed(0.4);
        derive(&mut r);
        assert!(r.derived.sf_ratio_gated.is_absent());
        assert!(approx(r.derived.sf_ratio.value(), 245.0));

        let mut r = ClinicalRecord::new(1);
        r.spo2 = Field::Observed(92.0);
        r.fio2 = Field::Observed(0.4);
        derive(&mut r);
        assert!(approx(r.derived.sf_ratio_gated.value(), 230.0));
        assert!(approx(r.derived.sf_ratio.value(), 230.0));
    }

    #[test]
    fn gcs_total_from_components() {
        let mut r = ClinicalRecord::new(1);
        r.auxiliary.gcs_eye = Field::Observed(2);
        r.auxiliary.gcs_verbal = Field::Observed(2);
        r.auxiliary.gcs_motor = Field::Observed(4);
        derive(&mut r);
        assert_eq!(r.gcs_total, Field::Derived(8));

        let mut r = ClinicalRecord::new(1);
        r.auxiliary.gcs_eye = Field::Observed(2);
        r.auxiliary.gcs_motor = Field::Observed(4);
        derive(&mut r);
        assert!(r.gcs_total.is_absent());
    }

    #[test]
    fn invalid_gcs_is_not_replaced_by_components() {
        let mut r = ClinicalRecord::new(1);
        r.gcs_total = Field::invalid(20, "outside [3, 15]");
        r.auxiliary.gcs_eye = Field::Observed(2);
        r.auxiliary.gcs_verbal = Field::Observed(2);
        r.auxiliary.gcs_motor = Field::Observed(4);
        derive(&mut r);
        assert!(matches!(r.gcs_total, Field::Invalid { .. }));
    }

    #[test]
    fn pao2_from_kpa_feeds_pf_ratio() {
        let mut r = ClinicalRecord::new(1);
        r.auxiliary.pao2_kpa = Field::Observed(8.0);
        r.fio2 = Field::Observed(0.5);
        derive(&mut r);
        assert!(approx(r.pao2.value(), 60.00496));
        assert!(approx(r.derived.pf_ratio.value(), 120.00992));
    }

    #[test]
    fn vasoactive_count() {
        let mut r = ClinicalRecord::new(1);
        derive(&mut r);
        assert!(r.derived.vasoactive_count.is_absent());

        let mut r = ClinicalRecord::new(1);
        r.vasoactives.epinephrine = Field::Observed(true);
        r.vasoactives.norepinephrine = Field::Observed(true);
        r.vasoactives.dopamine = Field::Observed(false);
        derive(&mut r);
        assert_eq!(r.derived.vasoactive_count, Field::Derived(2));
    }

    #[test]
    fn other_respiratory_support_from_fio2() {
        let mut r = ClinicalRecord::new(1);
        r.fio2 = Field::Observed(0.21);
        derive(&mut r);
        assert_eq!(r.derived.other_respiratory_support, Field::Derived(false));

        let mut r = ClinicalRecord::new(1);
        r.fio2 = Field::Observed(0.45);
        derive(&mut r);
        assert_eq!(r.derived.other_respiratory_support, Field::Derived(true));
    }

    #[test]
    fn derivation_is_idempotent() {
        let mut r = ClinicalRecord::new(1);
        r.fio2 = Field::Observed(0.45);
        r.spo2 = Field::Observed(92.0);
        r.pao2 = Field::Observed(70.0);
        r.sbp = Field::Observed(90.0);
        r.dbp = Field::Observed(50.0);
        r.auxiliary.wbc = Field::Observed(8.0);
        r.auxiliary.neutrophil_pct = Field::Observed(40.0);
        r.vasoactives.epinephrine = Field::Observed(true);

        derive(&mut r);
        let once = r.clone();
        derive(&mut r);
        assert_eq!(r, once);
    }
}
