//! Rule-based extraction backend.
//!
//! Reads common narrative phrasings with regular expressions and answers under
//! the same output contract as the hosted services: one JSON object with every
//! contract key, `null` for anything the narrative does not state. Values are
//! converted to the contract units (age in months, FiO2 as a fraction, mg/dL
//! for chemistry, thousand/mm³ for counts).

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::types::{ExtractionRequest, ServiceReply, TextService, SCHEMA_KEYS};
use super::ExtractionError;
use crate::models::{PupilState, VasoactiveDrug};

const NUM: &str = r"((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)";

fn pattern(template: &str) -> Regex {
    Regex::new(&template.replace("{NUM}", NUM)).expect("static extraction pattern")
}

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| pattern(r"[.!?](?:\s+|$)"));

static AGE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b{NUM}[\s-]*(years?|yrs?|months?|mos?|weeks?|wks?|days?)[\s-]*(?:old|of age)")
});

static FIO2: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\bfio2\b[^0-9.;/%]{0,25}?{NUM}\s*(%)?"));

static ROOM_AIR: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)\broom air\b"));

static SPO2: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:saturations?|spo2|sao2|sats?)\b[^0-9.;/]{0,25}?{NUM}\s*%")
});

static PAO2: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\bpao2\b[^0-9.;/]{0,20}?{NUM}\s*(kpa|mm\s*hg)?")
});

static INVASIVE_VENTILATION: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:intubat\w*|mechanical(?:ly)?\s+ventilat\w*|conventional\s+ventilator)")
});

static GCS_MENTION: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\b(?:gcs|glasgow coma scale)\b"));

static GCS_SUM: LazyLock<Regex> = LazyLock::new(|| pattern(r"=\s*(\d{1,2})\b"));

static GCS_STATED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:gcs|glasgow coma scale)(?:\s+score)?(?:\s+(?:of|is|was))?\s*[:=]?\s*(\d{1,2})\b")
});

static GCS_COMPONENT_FOR: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(\d)\s*(?:points?\s+)?for\s+(eye|verbal|motor)")
});

static GCS_COMPONENT_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(eye|verbal|motor)\w*(?:\s+response)?\s*[:=]?\s*(\d)\b")
});

static GCS_EVM: LazyLock<Regex> = LazyLock::new(|| pattern(r"\bE(\d)\s*V(\d)\s*M(\d)\b"));

static PUPIL_MENTION: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)\bpupils?\b"));

static PLATELETS: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:platelets?|plt)(?:\s+count)?\b[^0-9.;]{0,20}?{NUM}")
});

static INR: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)\binr\b[^0-9.;]{0,15}?{NUM}"));

static D_DIMER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\bd-?\s?dimer\b[^0-9.;]{0,15}?{NUM}\s*(ng/ml|[µμu]g/ml|mcg/ml|mg/l)?")
});

static FIBRINOGEN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\bfibrinogen\b[^0-9.;]{0,15}?{NUM}\s*(mg/dl|g/l)?")
});

static BLOOD_PRESSURE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:blood pressure|bp)\b[^0-9.;]{0,25}?(\d{2,3})\s*/\s*(\d{2,3})")
});

static LACTATE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\blactate\b(\s*dehydrogenase)?[^0-9.;]{0,15}?{NUM}\s*(mmol/l|mg/dl)?")
});

static GLUCOSE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\bglucose\b[^0-9.;]{0,15}?{NUM}\s*(mmol/l|mg/dl)?")
});

static WBC: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:white blood cell count|white cell count|wbc)\b[^0-9.;]{0,15}?{NUM}")
});

static NEUTROPHIL_PCT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i){NUM}\s*%\s*(?:segmented neutrophils|neutrophils|segs|polys)|\bneutrophils\b[^0-9.;]{0,10}?{NUM}\s*%")
});

static BANDS_PCT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i){NUM}\s*%\s*bands?\b|\bbands?\b[^0-9.;]{0,10}?{NUM}\s*%")
});

static ANC: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:absolute neutrophil count|anc)\b[^0-9.;]{0,15}?{NUM}")
});

static ALC: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:absolute lymphocyte count|alc)\b[^0-9.;]{0,15}?{NUM}")
});

static CREATININE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\bcreatinine\b[^0-9.;]{0,15}?{NUM}\s*(mg/dl|[µμu]mol/l)?")
});

static BILIRUBIN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\bbilirubin\b[^0-9.;]{0,15}?{NUM}\s*(mg/dl|[µμu]mol/l)?")
});

static ALT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:alt|alanine (?:aminotransferase|transaminase))\b[^0-9.;]{0,15}?{NUM}")
});

static DRUGS: LazyLock<Vec<(VasoactiveDrug, Regex)>> = LazyLock::new(|| {
    vec![
        (VasoactiveDrug::Dobutamine, pattern(r"(?i)\bdobutamine\b")),
        (VasoactiveDrug::Dopamine, pattern(r"(?i)\bdopamine\b")),
        (VasoactiveDrug::Epinephrine, pattern(r"(?i)\b(?:epinephrine|adrenaline)\b")),
        (VasoactiveDrug::Milrinone, pattern(r"(?i)\bmilrinone\b")),
        (
            VasoactiveDrug::Norepinephrine,
            pattern(r"(?i)\b(?:norepinephrine|noradrenaline|levophed)\b"),
        ),
        (VasoactiveDrug::Vasopressin, pattern(r"(?i)\bvasopressin\b")),
    ]
});

/// Words that negate a finding when they appear just before it.
const NEGATIONS: &[&str] = &["non-invasive", "noninvasive", "not ", "no ", "without ", "extubated"];

/// Deterministic, network-free extraction backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read every contract key (and any auxiliary inputs stated) from a narrative.
    pub fn extract_values(&self, narrative: &str, patient_id: i64) -> Map<String, Value> {
        let mut values = Map::new();
        for key in SCHEMA_KEYS {
            values.insert((*key).to_string(), Value::Null);
        }
        values.insert("pid".into(), Value::from(patient_id));

        let mut put = |key: &str, value: Option<f64>| {
            if let Some(v) = value {
                values.insert(key.to_string(), Value::from(round2(v)));
            }
        };

        put("age", age_months(narrative));
        put("fio2", fio2(narrative));
        put("spo2", last_number(&SPO2, narrative, 1));

        let (pao2_mmhg, pao2_kpa) = pao2(narrative);
        put("pao2", pao2_mmhg);
        put("pao2_kpa", pao2_kpa);

        put("platelets", first_number(&PLATELETS, narrative, 1).map(per_thousand));
        put("inr", first_number(&INR, narrative, 1));
        put("d_dimer", with_unit(&D_DIMER, narrative, d_dimer_mg_per_l));
        put("fibrinogen", with_unit(&FIBRINOGEN, narrative, fibrinogen_mg_per_dl));

        if let Some((sbp, dbp)) = blood_pressure(narrative) {
            put("sbp", Some(sbp));
            put("dbp", Some(dbp));
        }

        put("lactate", lactate(narrative));
        put("glucose", with_unit(&GLUCOSE, narrative, glucose_mg_per_dl));
        put("wbc", first_number(&WBC, narrative, 1).map(per_thousand));
        put("neutrophil_pct", either_group(&NEUTROPHIL_PCT, narrative));
        put("bands_pct", either_group(&BANDS_PCT, narrative));
        put("anc", first_number(&ANC, narrative, 1).map(per_thousand));
        put("alc", first_number(&ALC, narrative, 1).map(per_thousand));
        put("creatinine", with_unit(&CREATININE, narrative, creatinine_mg_per_dl));
        put("bilirubin", with_unit(&BILIRUBIN, narrative, bilirubin_mg_per_dl));
        put("alt", first_number(&ALT, narrative, 1));

        if invasive_ventilation(narrative) {
            values.insert("vent".into(), Value::from(1));
        }

        let gcs = glasgow_coma_scale(narrative);
        if let Some(total) = gcs.total {
            values.insert("gcs_total".into(), Value::from(total));
        }
        for (key, component) in [
            ("gcs_eye", gcs.eye),
            ("gcs_verbal", gcs.verbal),
            ("gcs_motor", gcs.motor),
        ] {
            if let Some(v) = component {
                values.insert(key.into(), Value::from(v));
            }
        }

        if let Some(state) = pupil_state(narrative) {
            values.insert("pupil".into(), Value::from(state.as_str()));
        }

        for (drug, re) in DRUGS.iter() {
            if mentioned_without_negation(re, narrative) {
                values.insert(drug.as_str().into(), Value::from(1));
            }
        }

        values
    }
}

impl TextService for RuleBasedExtractor {
    fn name(&self) -> &str {
        "rules"
    }

    fn complete(&self, request: &ExtractionRequest) -> Result<ServiceReply, ExtractionError> {
        let values = self.extract_values(&request.narrative, request.patient_id);
        let text = serde_json::to_string(&Value::Object(values))
            .map_err(|e| ExtractionError::unavailable(e.to_string(), false))?;
        Ok(ServiceReply { text, usage: None })
    }
}

// ── Field readers ───────────────────────────────────────────

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Thousands separators (`12,000`) are dropped before parsing.
fn number(caps: &Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group)?.as_str().replace(',', "").parse().ok()
}

fn unit(caps: &Captures<'_>, group: usize) -> Option<String> {
    caps.get(group).map(|m| m.as_str().to_lowercase())
}

fn first_number(re: &Regex, text: &str, group: usize) -> Option<f64> {
    re.captures_iter(text).find_map(|c| number(&c, group))
}

fn last_number(re: &Regex, text: &str, group: usize) -> Option<f64> {
    re.captures_iter(text).filter_map(|c| number(&c, group)).last()
}

/// First match of a `{NUM} unit` pattern, converted by `convert`.
fn with_unit(re: &Regex, text: &str, convert: fn(f64, Option<&str>) -> f64) -> Option<f64> {
    let caps = re.captures(text)?;
    let value = number(&caps, 1)?;
    Some(convert(value, unit(&caps, 2).as_deref()))
}

/// Value from whichever alternative of a two-branch pattern matched.
fn either_group(re: &Regex, text: &str) -> Option<f64> {
    let caps = re.captures(text)?;
    number(&caps, 1).or_else(|| number(&caps, 2))
}

/// Counts written per mm³ (e.g. 120000) are brought to thousand/mm³.
fn per_thousand(v: f64) -> f64 {
    if v >= 1000.0 {
        v / 1000.0
    } else {
        v
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE_END.split(text).filter(|s| !s.trim().is_empty())
}

fn negated_before(text: &str, start: usize) -> bool {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .nth(15)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window = text[window_start..start].to_lowercase();
    NEGATIONS.iter().any(|n| window.contains(n))
}

fn mentioned_without_negation(re: &Regex, text: &str) -> bool {
    re.find_iter(text).any(|m| !negated_before(text, m.start()))
}

fn age_months(text: &str) -> Option<f64> {
    let caps = AGE.captures(text)?;
    let value = number(&caps, 1)?;
    let unit = unit(&caps, 2)?;
    let months = if unit.starts_with('y') {
        value * 12.0
    } else if unit.starts_with('m') {
        value
    } else if unit.starts_with('w') {
        value * 7.0 / 30.44
    } else {
        value / 30.44
    };
    Some(months)
}

/// Explicit FiO2 wins; "room air" alone means 0.21.
fn fio2(text: &str) -> Option<f64> {
    if let Some(caps) = FIO2.captures(text) {
        let value = number(&caps, 1)?;
        let percent = caps.get(2).is_some() || value > 1.0;
        return Some(if percent { value / 100.0 } else { value });
    }
    ROOM_AIR.is_match(text).then_some(0.21)
}

/// PaO2 in mmHg, plus the raw kPa value when that is how it was written.
fn pao2(text: &str) -> (Option<f64>, Option<f64>) {
    let Some(caps) = PAO2.captures(text) else {
        return (None, None);
    };
    let value = number(&caps, 1);
    match unit(&caps, 2).as_deref() {
        Some("kpa") => (None, value),
        _ => (value, None),
    }
}

fn invasive_ventilation(text: &str) -> bool {
    mentioned_without_negation(&INVASIVE_VENTILATION, text)
}

#[derive(Debug, Default, PartialEq)]
struct GcsReading {
    total: Option<u8>,
    eye: Option<u8>,
    verbal: Option<u8>,
    motor: Option<u8>,
}

fn glasgow_coma_scale(text: &str) -> GcsReading {
    let mut reading = GcsReading::default();
    let Some(sentence) = sentences(text).find(|s| GCS_MENTION.is_match(s)) else {
        return reading;
    };

    let parse = |m: Option<regex::Match<'_>>| m.and_then(|m| m.as_str().parse::<u8>().ok());

    if let Some(caps) = GCS_EVM.captures(sentence) {
        reading.eye = parse(caps.get(1));
        reading.verbal = parse(caps.get(2));
        reading.motor = parse(caps.get(3));
    } else {
        let mut assign = |name: &str, value: Option<u8>| {
            let slot = match name.to_lowercase().as_str() {
                "eye" => &mut reading.eye,
                "verbal" => &mut reading.verbal,
                _ => &mut reading.motor,
            };
            if slot.is_none() {
                *slot = value;
            }
        };
        for caps in GCS_COMPONENT_FOR.captures_iter(sentence) {
            assign(&caps[2], parse(caps.get(1)));
        }
        for caps in GCS_COMPONENT_NAMED.captures_iter(sentence) {
            assign(&caps[1], parse(caps.get(2)));
        }
    }

    reading.total = GCS_SUM
        .captures(sentence)
        .and_then(|c| parse(c.get(1)))
        .or_else(|| {
            GCS_STATED
                .captures(sentence)
                .and_then(|c| parse(c.get(1)))
        });

    reading
}

fn pupil_state(text: &str) -> Option<PupilState> {
    sentences(text)
        .filter(|s| PUPIL_MENTION.is_match(s))
        .find_map(PupilState::parse_lenient)
}

fn d_dimer_mg_per_l(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        Some("ng/ml") => value / 1000.0,
        _ => value,
    }
}

fn fibrinogen_mg_per_dl(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        Some("g/l") => value * 100.0,
        _ => value,
    }
}

fn blood_pressure(text: &str) -> Option<(f64, f64)> {
    let caps = BLOOD_PRESSURE.captures(text)?;
    Some((number(&caps, 1)?, number(&caps, 2)?))
}

/// Serum lactate in mmol/L; lactate dehydrogenase is skipped.
fn lactate(text: &str) -> Option<f64> {
    LACTATE
        .captures_iter(text)
        .filter(|c| c.get(1).is_none())
        .find_map(|c| {
            let value = number(&c, 2)?;
            Some(match unit(&c, 3).as_deref() {
                Some("mg/dl") => value / 9.008,
                _ => value,
            })
        })
}

fn glucose_mg_per_dl(value: f64, unit: Option<&str>) -> f64 {
    match unit {
        Some("mmol/l") => value * 18.016,
        _ => value,
    }
}

fn is_micromolar(unit: Option<&str>) -> bool {
    unit.is_some_and(|u| u.ends_with("mol/l") && !u.starts_with("mmol"))
}

fn creatinine_mg_per_dl(value: f64, unit: Option<&str>) -> f64 {
    if is_micromolar(unit) {
        value / 88.42
    } else {
        value
    }
}

fn bilirubin_mg_per_dl(value: f64, unit: Option<&str>) -> f64 {
    if is_micromolar(unit) {
        value / 17.1
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIGNETTE: &str = "A 6-year-old boy with a history of prematurity presents with \
        respiratory distress. He has an oxygen saturation of 89% on room air. In the emergency \
        department, he is started on non-invasive positive pressure ventilation. His level of \
        consciousness deteriorates rapidly: Glasgow Coma Scale: 2 for eye response + 2 for verbal \
        response + 4 for motor response = 8. He is intubated and placed on a conventional \
        ventilator with an FiO2 of 0.45 to achieve an oxygen saturation of 92%. Complete blood \
        count reveals a platelet count of 120 K/μL. A coagulation panel reveals an INR of 1.7, a \
        D-Dimer of 4.4 mg/L, and a fibrinogen of 120 mg/dL. Serum lactate is 2.9 mmol/L.";

    fn extract(text: &str) -> Map<String, Value> {
        RuleBasedExtractor::new().extract_values(text, 7)
    }

    fn num(values: &Map<String, Value>, key: &str) -> Option<f64> {
        values.get(key).and_then(Value::as_f64)
    }

    #[test]
    fn reference_vignette_is_read() {
        let v = extract(VIGNETTE);
        assert_eq!(num(&v, "pid"), Some(7.0));
        assert_eq!(num(&v, "age"), Some(72.0));
        assert_eq!(num(&v, "fio2"), Some(0.45));
        assert_eq!(num(&v, "spo2"), Some(92.0));
        assert_eq!(num(&v, "vent"), Some(1.0));
        assert_eq!(num(&v, "gcs_total"), Some(8.0));
        assert_eq!(num(&v, "gcs_eye"), Some(2.0));
        assert_eq!(num(&v, "gcs_motor"), Some(4.0));
        assert_eq!(num(&v, "platelets"), Some(120.0));
        assert_eq!(num(&v, "inr"), Some(1.7));
        assert_eq!(num(&v, "d_dimer"), Some(4.4));
        assert_eq!(num(&v, "fibrinogen"), Some(120.0));
        assert_eq!(num(&v, "lactate"), Some(2.9));
    }

    #[test]
    fn unmentioned_contract_keys_are_null() {
        let v = extract(VIGNETTE);
        for key in ["pao2", "pupil", "sbp", "dbp", "glucose", "creatinine", "dopamine"] {
            assert_eq!(v.get(key), Some(&Value::Null), "{key}");
        }
        assert!(v.get("wbc").is_none());
        assert_eq!(v.len(), SCHEMA_KEYS.len() + 3);
    }

    #[test]
    fn service_reply_is_contract_json() {
        let request = ExtractionRequest {
            patient_id: 3,
            narrative: VIGNETTE.into(),
            system_prompt: String::new(),
            user_prompt: String::new(),
        };
        let reply = RuleBasedExtractor::new().complete(&request).unwrap();
        let parsed: Value = serde_json::from_str(&reply.text).unwrap();
        assert_eq!(parsed["pid"], 3);
        assert!(reply.usage.is_none());
    }

    #[test]
    fn room_air_only_when_no_explicit_fio2() {
        assert_eq!(num(&extract("Saturation 95% on room air."), "fio2"), Some(0.21));
        assert_eq!(num(&extract("FiO2 60% via mask. Was on room air."), "fio2"), Some(0.6));
    }

    #[test]
    fn non_invasive_support_is_not_ventilation() {
        let v = extract("Started on non-invasive mechanical ventilation overnight.");
        assert_eq!(v.get("vent"), Some(&Value::Null));
    }

    #[test]
    fn age_units() {
        assert_eq!(num(&extract("An 18-month-old girl."), "age"), Some(18.0));
        assert_eq!(num(&extract("A 3 years old child."), "age"), Some(36.0));
        let days = num(&extract("A 10-day-old neonate."), "age").unwrap();
        assert!((days - 0.33).abs() < 0.01);
    }

    #[test]
    fn si_units_are_converted() {
        let v = extract(
            "Glucose 10 mmol/L; creatinine 88.42 µmol/L; bilirubin 171 μmol/L; fibrinogen 1.5 g/L; D-dimer 2500 ng/mL.",
        );
        assert!((num(&v, "glucose").unwrap() - 180.16).abs() < 0.01);
        assert_eq!(num(&v, "creatinine"), Some(1.0));
        assert_eq!(num(&v, "bilirubin"), Some(10.0));
        assert_eq!(num(&v, "fibrinogen"), Some(150.0));
        assert_eq!(num(&v, "d_dimer"), Some(2.5));
    }

    #[test]
    fn lactate_dehydrogenase_is_not_lactate() {
        let v = extract("Lactate dehydrogenase 640 U/L; lactate 6.1 mmol/L.");
        assert_eq!(num(&v, "lactate"), Some(6.1));
        assert_eq!(extract("Lactate dehydrogenase 640 U/L.").get("lactate"), Some(&Value::Null));
    }

    #[test]
    fn blood_pressure_and_drugs() {
        let v = extract("Blood pressure 70/30 mmHg despite epinephrine and noradrenaline. No dopamine.");
        assert_eq!(num(&v, "sbp"), Some(70.0));
        assert_eq!(num(&v, "dbp"), Some(30.0));
        assert_eq!(num(&v, "epinephrine"), Some(1.0));
        assert_eq!(num(&v, "norepinephrine"), Some(1.0));
        assert_eq!(v.get("dopamine"), Some(&Value::Null));
    }

    #[test]
    fn pupils_read_from_their_sentence() {
        let v = extract("GCS 5. Pupils are fixed and dilated bilaterally.");
        assert_eq!(v.get("pupil"), Some(&Value::from("both-fixed")));
        assert_eq!(num(&v, "gcs_total"), Some(5.0));
    }

    #[test]
    fn gcs_components_without_total() {
        let v = extract("Glasgow Coma Scale E2 V3 M4 on arrival.");
        assert_eq!(num(&v, "gcs_eye"), Some(2.0));
        assert_eq!(num(&v, "gcs_verbal"), Some(3.0));
        assert_eq!(num(&v, "gcs_motor"), Some(4.0));
        assert_eq!(v.get("gcs_total"), Some(&Value::Null));
    }

    #[test]
    fn differential_and_counts() {
        let v = extract("WBC 12,000. White cell differential: 40% segmented neutrophils, 10% bands. Platelets 85000.");
        assert_eq!(num(&v, "wbc"), Some(12.0));
        assert_eq!(num(&v, "neutrophil_pct"), Some(40.0));
        assert_eq!(num(&v, "bands_pct"), Some(10.0));
        assert_eq!(num(&v, "platelets"), Some(85.0));
    }

    #[test]
    fn comma_grouped_counts_are_read_whole() {
        let v = extract("ANC 1,250, platelets 120,000 and WBC 2,500.");
        assert_eq!(num(&v, "anc"), Some(1.25));
        assert_eq!(num(&v, "platelets"), Some(120.0));
        assert_eq!(num(&v, "wbc"), Some(2.5));
    }

    #[test]
    fn pao2_in_kpa_goes_to_auxiliary() {
        let v = extract("Arterial gas: PaO2 8 kPa.");
        assert_eq!(v.get("pao2"), Some(&Value::Null));
        assert_eq!(num(&v, "pao2_kpa"), Some(8.0));
    }
}
