//! ClinicalRecord: one row per patient case.
//!
//! Every schema value is wrapped in [`Field`], which keeps track of whether the
//! value was observed in the narrative, derived from other values, absent, or
//! discarded as invalid. Absent is distinct from zero everywhere.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::enums::{PupilState, VasoactiveDrug};

/// A schema value together with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// Stated in the source narrative (possibly after unit conversion).
    Observed(T),
    /// Computed from other present fields.
    Derived(T),
    /// Not stated and not derivable.
    Absent,
    /// Present in the source but out of range or unusable; the value is discarded.
    Invalid { raw: String, reason: String },
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Absent
    }
}

/// Per-field audit status, as shown to clinical reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Observed,
    Derived,
    Absent,
    Invalid,
}

impl<T: Copy> Field<T> {
    /// The usable value, if any. Invalid fields have none.
    pub fn value(&self) -> Option<T> {
        match self {
            Self::Observed(v) | Self::Derived(v) => Some(*v),
            Self::Absent | Self::Invalid { .. } => None,
        }
    }
}

impl<T> Field<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Observed(_) | Self::Derived(_))
    }

    /// True only for the absent marker; invalid fields are not absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn status(&self) -> FieldStatus {
        match self {
            Self::Observed(_) => FieldStatus::Observed,
            Self::Derived(_) => FieldStatus::Derived,
            Self::Absent => FieldStatus::Absent,
            Self::Invalid { .. } => FieldStatus::Invalid,
        }
    }

    pub fn invalid(raw: impl ToString, reason: impl Into<String>) -> Self {
        Self::Invalid {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

impl<T: Serialize> Field<T> {
    /// Flat JSON value: the number (or string) when present, `null` otherwise.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Observed(v) | Self::Derived(v) => {
                serde_json::to_value(v).unwrap_or(Value::Null)
            }
            Self::Absent | Self::Invalid { .. } => Value::Null,
        }
    }
}

impl Field<bool> {
    /// Indicator flags are reported as 0/1.
    fn flag_json(&self) -> Value {
        match self.value() {
            Some(true) => Value::from(1),
            Some(false) => Value::from(0),
            None => Value::Null,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// The six vasoactive drug indicators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VasoactiveFlags {
    pub dobutamine: Field<bool>,
    pub dopamine: Field<bool>,
    pub epinephrine: Field<bool>,
    pub milrinone: Field<bool>,
    pub norepinephrine: Field<bool>,
    pub vasopressin: Field<bool>,
}

impl VasoactiveFlags {
    pub fn get(&self, drug: VasoactiveDrug) -> &Field<bool> {
        match drug {
            VasoactiveDrug::Dobutamine => &self.dobutamine,
            VasoactiveDrug::Dopamine => &self.dopamine,
            VasoactiveDrug::Epinephrine => &self.epinephrine,
            VasoactiveDrug::Milrinone => &self.milrinone,
            VasoactiveDrug::Norepinephrine => &self.norepinephrine,
            VasoactiveDrug::Vasopressin => &self.vasopressin,
        }
    }

    pub fn get_mut(&mut self, drug: VasoactiveDrug) -> &mut Field<bool> {
        match drug {
            VasoactiveDrug::Dobutamine => &mut self.dobutamine,
            VasoactiveDrug::Dopamine => &mut self.dopamine,
            VasoactiveDrug::Epinephrine => &mut self.epinephrine,
            VasoactiveDrug::Milrinone => &mut self.milrinone,
            VasoactiveDrug::Norepinephrine => &mut self.norepinephrine,
            VasoactiveDrug::Vasopressin => &mut self.vasopressin,
        }
    }

    pub fn any_present(&self) -> bool {
        VasoactiveDrug::ALL.iter().any(|d| self.get(*d).is_present())
    }
}

/// Narrative values that only feed derivations (not scored directly).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryInputs {
    /// White blood cell count, thousand cells/mm³.
    pub wbc: Field<f64>,
    /// Segmented neutrophils, % of WBC.
    pub neutrophil_pct: Field<f64>,
    /// Band neutrophils, % of WBC.
    pub bands_pct: Field<f64>,
    pub gcs_eye: Field<u8>,
    pub gcs_verbal: Field<u8>,
    pub gcs_motor: Field<u8>,
    /// Arterial oxygen partial pressure reported in kPa.
    pub pao2_kpa: Field<f64>,
}

/// Values that exist only as functions of other fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedMeasures {
    pub mean_arterial_pressure: Field<f64>,
    pub pf_ratio: Field<f64>,
    /// SpO2:FiO2 without saturation gating (4-domain score).
    pub sf_ratio: Field<f64>,
    /// SpO2:FiO2 only when SpO2 ≤ 97 (8-domain score).
    pub sf_ratio_gated: Field<f64>,
    pub vasoactive_count: Field<u8>,
    pub other_respiratory_support: Field<bool>,
}

/// One patient case, populated by normalization and enriched by derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalRecord {
    patient_id: i64,
    pub age_months: Field<f64>,
    pub fio2: Field<f64>,
    pub pao2: Field<f64>,
    pub spo2: Field<f64>,
    pub ventilated: Field<bool>,
    pub gcs_total: Field<u8>,
    pub pupil_state: Field<PupilState>,
    pub platelets: Field<f64>,
    pub inr: Field<f64>,
    pub d_dimer: Field<f64>,
    pub fibrinogen: Field<f64>,
    pub sbp: Field<f64>,
    pub dbp: Field<f64>,
    pub lactate: Field<f64>,
    pub vasoactives: VasoactiveFlags,
    pub glucose: Field<f64>,
    pub anc: Field<f64>,
    pub alc: Field<f64>,
    pub creatinine: Field<f64>,
    pub bilirubin: Field<f64>,
    pub alt: Field<f64>,
    pub auxiliary: AuxiliaryInputs,
    pub derived: DerivedMeasures,
}

/// A view of one record entry for flat output and auditing.
struct Entry {
    key: &'static str,
    value: Value,
    status: FieldStatus,
    reason: Option<String>,
}

fn entry<T: Serialize>(key: &'static str, field: &Field<T>) -> Entry {
    Entry {
        key,
        value: field.to_json(),
        status: field.status(),
        reason: invalid_reason(field),
    }
}

fn flag_entry(key: &'static str, field: &Field<bool>) -> Entry {
    Entry {
        key,
        value: field.flag_json(),
        status: field.status(),
        reason: invalid_reason(field),
    }
}

fn invalid_reason<T>(field: &Field<T>) -> Option<String> {
    match field {
        Field::Invalid { raw, reason } => Some(format!("{reason} (was {raw})")),
        _ => None,
    }
}

impl ClinicalRecord {
    /// An empty record: every field absent.
    pub fn new(patient_id: i64) -> Self {
        Self {
            patient_id,
            age_months: Field::Absent,
            fio2: Field::Absent,
            pao2: Field::Absent,
            spo2: Field::Absent,
            ventilated: Field::Absent,
            gcs_total: Field::Absent,
            pupil_state: Field::Absent,
            platelets: Field::Absent,
            inr: Field::Absent,
            d_dimer: Field::Absent,
            fibrinogen: Field::Absent,
            sbp: Field::Absent,
            dbp: Field::Absent,
            lactate: Field::Absent,
            vasoactives: VasoactiveFlags::default(),
            glucose: Field::Absent,
            anc: Field::Absent,
            alc: Field::Absent,
            creatinine: Field::Absent,
            bilirubin: Field::Absent,
            alt: Field::Absent,
            auxiliary: AuxiliaryInputs::default(),
            derived: DerivedMeasures::default(),
        }
    }

    /// Caller-supplied identifier, fixed at construction.
    pub fn patient_id(&self) -> i64 {
        self.patient_id
    }

    fn entries(&self) -> Vec<Entry> {
        let v = &self.vasoactives;
        let aux = &self.auxiliary;
        let d = &self.derived;
        vec![
            entry("age_months", &self.age_months),
            entry("fio2", &self.fio2),
            entry("pao2", &self.pao2),
            entry("spo2", &self.spo2),
            flag_entry("ventilated", &self.ventilated),
            entry("gcs_total", &self.gcs_total),
            entry("pupil_state", &self.pupil_state),
            entry("platelets", &self.platelets),
            entry("inr", &self.inr),
            entry("d_dimer", &self.d_dimer),
            entry("fibrinogen", &self.fibrinogen),
            entry("sbp", &self.sbp),
            entry("dbp", &self.dbp),
            entry("lactate", &self.lactate),
            flag_entry("dobutamine", &v.dobutamine),
            flag_entry("dopamine", &v.dopamine),
            flag_entry("epinephrine", &v.epinephrine),
            flag_entry("milrinone", &v.milrinone),
            flag_entry("norepinephrine", &v.norepinephrine),
            flag_entry("vasopressin", &v.vasopressin),
            entry("glucose", &self.glucose),
            entry("anc", &self.anc),
            entry("alc", &self.alc),
            entry("creatinine", &self.creatinine),
            entry("bilirubin", &self.bilirubin),
            entry("alt", &self.alt),
            entry("wbc", &aux.wbc),
            entry("neutrophil_pct", &aux.neutrophil_pct),
            entry("bands_pct", &aux.bands_pct),
            entry("gcs_eye", &aux.gcs_eye),
            entry("gcs_verbal", &aux.gcs_verbal),
            entry("gcs_motor", &aux.gcs_motor),
            entry("pao2_kpa", &aux.pao2_kpa),
            entry("mean_arterial_pressure", &d.mean_arterial_pressure),
            entry("pf_ratio", &d.pf_ratio),
            entry("sf_ratio", &d.sf_ratio),
            entry("sf_ratio_gated", &d.sf_ratio_gated),
            entry("vasoactive_count", &d.vasoactive_count),
            flag_entry("other_respiratory_support", &d.other_respiratory_support),
        ]
    }

    /// Flat key → value-or-null map, including `patient_id`.
    pub fn to_flat_map(&self) -> BTreeMap<&'static str, Value> {
        let mut map: BTreeMap<&'static str, Value> =
            self.entries().into_iter().map(|e| (e.key, e.value)).collect();
        map.insert("patient_id", Value::from(self.patient_id));
        map
    }

    /// Key → observed / derived / absent / invalid.
    pub fn provenance(&self) -> BTreeMap<&'static str, FieldStatus> {
        self.entries()
            .into_iter()
            .map(|e| (e.key, e.status))
            .collect()
    }

    /// Keys of discarded fields with the reason they were discarded.
    pub fn invalid_fields(&self) -> BTreeMap<&'static str, String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.reason.map(|r| (e.key, r)))
            .collect()
    }
}

impl Serialize for ClinicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_flat_map().serialize(serializer)
    }
}
