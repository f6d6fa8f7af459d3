use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ExtractionError;

/// Keys the extraction contract requires, in contract order.
pub const SCHEMA_KEYS: &[&str] = &[
    "pid",
    "age",
    "fio2",
    "pao2",
    "spo2",
    "vent",
    "gcs_total",
    "pupil",
    "platelets",
    "inr",
    "d_dimer",
    "fibrinogen",
    "dbp",
    "sbp",
    "lactate",
    "dobutamine",
    "dopamine",
    "epinephrine",
    "milrinone",
    "norepinephrine",
    "vasopressin",
    "glucose",
    "anc",
    "alc",
    "creatinine",
    "bilirubin",
    "alt",
];

/// Optional keys that only feed derivations.
pub const AUXILIARY_KEYS: &[&str] = &[
    "wbc",
    "neutrophil_pct",
    "bands_pct",
    "gcs_eye",
    "gcs_verbal",
    "gcs_motor",
    "pao2_kpa",
];

/// One call to the text-understanding service.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub patient_id: i64,
    /// Sanitized narrative, for backends that read the case directly.
    pub narrative: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Token accounting reported by the service for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Raw service reply before any repair.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Text-understanding service abstraction (allows mocking).
///
/// Implementations are blocking; the pipeline runs them off the async
/// runtime under a timeout.
pub trait TextService: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn complete(&self, request: &ExtractionRequest) -> Result<ServiceReply, ExtractionError>;
}

/// Record as handed back by the service, after repair and parsing.
///
/// Values are untyped JSON; the normalizer turns them into a `ClinicalRecord`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub patient_id: i64,
    pub values: BTreeMap<String, Value>,
}

impl CandidateRecord {
    pub fn new(patient_id: i64) -> Self {
        Self {
            patient_id,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Contract keys the service left out entirely (not even `null`).
    pub fn missing_keys(&self) -> Vec<&'static str> {
        SCHEMA_KEYS
            .iter()
            .filter(|k| !self.values.contains_key(**k))
            .copied()
            .collect()
    }
}

pub fn is_known_key(key: &str) -> bool {
    SCHEMA_KEYS.contains(&key) || AUXILIARY_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_covers_every_record_field() {
        assert_eq!(SCHEMA_KEYS.len(), 27);
        assert_eq!(SCHEMA_KEYS[0], "pid");
        assert!(SCHEMA_KEYS.contains(&"pupil"));
        assert!(!SCHEMA_KEYS.iter().any(|k| AUXILIARY_KEYS.contains(k)));
    }

    #[test]
    fn missing_keys_ignores_explicit_nulls() {
        let candidate = CandidateRecord::new(1)
            .with_value("pid", Value::from(1))
            .with_value("age", Value::Null);
        let missing = candidate.missing_keys();
        assert!(!missing.contains(&"age"));
        assert!(missing.contains(&"fio2"));
        assert_eq!(missing.len(), SCHEMA_KEYS.len() - 2);
    }

    #[test]
    fn known_keys() {
        assert!(is_known_key("gcs_total"));
        assert!(is_known_key("bands_pct"));
        assert!(!is_known_key("heart_rate"));
    }

    #[test]
    fn text_service_is_object_safe() {
        fn _assert(_: &dyn TextService) {}
    }
}
