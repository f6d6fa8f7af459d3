pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a medical data analyst assistant. \
Your ONLY role is to turn a pediatric sepsis case summary into one JSON data entry. \
You never add explanations, notes or code.";

/// Build the extraction prompt for one case.
pub fn build_extraction_prompt(narrative: &str, patient_id: i64) -> String {
    format!(
        r#"<case>
{narrative}
</case>

Create ONE JSON object representing the data entry for this sepsis patient.
Use exactly these keys, in this order:

- "pid": patient identification number. Use {patient_id}.
- "age": age in MONTHS. If the age is given in years, multiply by 12.
- "fio2": fraction of inspired oxygen, as a fraction between 0 and 1 (45% -> 0.45). Room air is 0.21.
- "pao2": arterial partial pressure of oxygen in mmHg. pao2 is NOT a generic po2.
- "spo2": pulse oximetry saturation in %.
- "vent": invasive mechanical ventilation (1 yes, 0 no). Non-invasive support is 0.
- "gcs_total": Glasgow Coma Scale total (eye + verbal + motor), integer 3 to 15.
- "pupil": "reactive", "fixed" or "both-fixed" (both pupils fixed). null if not mentioned.
- "platelets": platelet count in 1,000/µL.
- "inr": International Normalized Ratio.
- "d_dimer": D-dimer in mg/L FEU.
- "fibrinogen": fibrinogen in mg/dL.
- "dbp": diastolic blood pressure in mmHg.
- "sbp": systolic blood pressure in mmHg.
- "lactate": lactate in mmol/L (arterial or venous). Lactate dehydrogenase is NOT lactate.
- "dobutamine", "dopamine", "epinephrine", "milrinone", "norepinephrine", "vasopressin":
  systemic administration of that drug (1 yes, 0 no). Vasopressin is only vasopressin,
  not vasopressors in general.
- "glucose": glucose in mg/dL.
- "anc": absolute neutrophil count in 1,000 cells/mm³. If only a percentage is given,
  ANC = (percentage × WBC) / 100. When bands and segmented neutrophils are both given,
  add the two percentages first.
- "alc": absolute lymphocyte count in 1,000 cells/mm³. If not given, ALC = WBC - ANC.
- "creatinine": creatinine in mg/dL.
- "bilirubin": total bilirubin in mg/dL.
- "alt": alanine aminotransferase in IU/L.

RULES (ABSOLUTE, NO EXCEPTIONS):
1. Use null for any value not mentioned in the case. Never guess.
2. Convert every value to the unit stated above before writing it.
3. Numbers are JSON numbers, indicators are 0 or 1.
4. Use double quotes for keys and strings.
5. Output ONLY the JSON object. No additional text, no explanations, no code fences.
"#
    )
}
