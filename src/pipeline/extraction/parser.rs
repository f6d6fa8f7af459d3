use serde_json::Value;

use super::repair::repair_record_text;
use super::types::{is_known_key, CandidateRecord};
use super::ExtractionError;

/// Parse raw service output into a candidate record.
///
/// The caller-supplied `patient_id` is authoritative: a differing `pid` from
/// the service is overwritten. Unknown keys are dropped, missing contract keys
/// are left for the normalizer to treat as absent.
pub fn parse_candidate(raw: &str, patient_id: i64) -> Result<CandidateRecord, ExtractionError> {
    let repaired = repair_record_text(raw)?;

    let parsed: Value =
        serde_json::from_str(&repaired).map_err(|e| ExtractionError::MalformedOutput {
            reason: e.to_string(),
            raw: raw.to_string(),
        })?;

    let Value::Object(map) = parsed else {
        return Err(ExtractionError::MalformedOutput {
            reason: "top-level value is not an object".into(),
            raw: raw.to_string(),
        });
    };

    if let Some(reported) = map.get("pid").and_then(Value::as_i64) {
        if reported != patient_id {
            tracing::warn!(
                patient_id,
                reported_pid = reported,
                "Service returned a different pid; keeping caller-supplied id"
            );
        }
    }

    let mut candidate = CandidateRecord::new(patient_id);
    for (key, value) in map {
        if key == "pid" {
            continue;
        }
        if is_known_key(&key) {
            candidate.values.insert(key, value);
        } else {
            tracing::debug!(patient_id, key = %key, "Dropping unknown key from service output");
        }
    }
    candidate
        .values
        .insert("pid".to_string(), Value::from(patient_id));

    let missing = candidate.missing_keys();
    if !missing.is_empty() {
        tracing::debug!(
            patient_id,
            missing = ?missing,
            "Service output omitted contract keys; treating them as absent"
        );
    }

    Ok(candidate)
}
