// Best-effort repair of raw service output before structural parsing.
// Order: strip fences and trailing annotations, isolate the object,
// normalize quotation, substitute null sentinels, drop trailing commas.

use super::ExtractionError;

/// Bare words the service uses for "no value", compared case-insensitively.
const NULL_SENTINELS: &[&str] = &[
    "none", "null", "nan", "undefined", "n/a", "na", "nil", "inf", "infinity",
];

/// Repair raw service output into text that should parse as a JSON object.
///
/// Returns `NoStructuredOutput` when no `{ ... }` span survives stripping.
pub fn repair_record_text(raw: &str) -> Result<String, ExtractionError> {
    let stripped = strip_annotations(&strip_code_fences(raw));
    let object = isolate_object(&stripped).ok_or_else(|| ExtractionError::NoStructuredOutput {
        raw: raw.to_string(),
    })?;
    let quoted = normalize_quotes(object);
    let nulled = substitute_sentinels(&quoted);
    Ok(remove_trailing_commas(&nulled))
}

/// Remove ``` fences and any language tag directly after them.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 3..];
        let tag_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        rest = &after[tag_len..];
    }
    out.push_str(rest);
    out
}

/// Cut `# ...` and `// ...` annotations that appear outside quoted strings.
pub fn strip_annotations(text: &str) -> String {
    text.lines()
        .map(strip_line_annotation)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_line_annotation(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<(usize, char)> = None;

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '#' => return line[..i].trim_end(),
                '/' if matches!(prev, Some((_, '/'))) => {
                    let start = prev.map(|(p, _)| p).unwrap_or(i);
                    return line[..start].trim_end();
                }
                _ => {}
            }
        }
        prev = Some((i, c));
    }
    line
}

/// The outermost `{ ... }` span, ignoring any text before or after it.
pub fn isolate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Rewrite single-quoted and typographic-quoted strings with double quotes.
pub fn normalize_quotes(text: &str) -> String {
    let text = text
        .replace(&['\u{201C}', '\u{201D}'][..], "\"")
        .replace(&['\u{2018}', '\u{2019}'][..], "'");

    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                out.push('"');
            }
            (Some(q), _) if c == q => {
                quote = None;
                out.push('"');
            }
            (Some('\''), '"') => out.push_str("\\\""),
            (Some(q), '\\') => match chars.next() {
                Some('\'') if q == '\'' => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Replace bare null-like words with `null` and Python booleans with JSON ones.
///
/// Text inside double-quoted strings is left untouched.
pub fn substitute_sentinels(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        if word.is_empty() {
            return;
        }
        let lower = word.to_lowercase();
        if NULL_SENTINELS.contains(&lower.as_str()) {
            out.push_str("null");
        } else if lower == "true" || lower == "false" {
            out.push_str(&lower);
        } else {
            out.push_str(word);
        }
        word.clear();
    };

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        let continues_word = !word.is_empty() && (c.is_ascii_alphanumeric() || c == '_' || c == '/');
        if c.is_ascii_alphabetic() || continues_word {
            word.push(c);
            continue;
        }

        flush(&mut word, &mut out);
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    flush(&mut word, &mut out);
    out
}

/// Drop commas that directly precede a closing brace or bracket.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parses(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap_or_else(|e| panic!("{e}: {text}"))
    }

    #[test]
    fn fenced_output_with_trailing_comment_is_repaired() {
        let raw = "```json\n{\"pid\": 1, \"age\": 72}\n# derived age from years\n```";
        let repaired = repair_record_text(raw).unwrap();
        assert!(!repaired.contains("```"));
        assert!(!repaired.contains('#'));
        let value = parses(&repaired);
        assert_eq!(value["age"], 72);
    }

    #[test]
    fn inline_comments_are_cut() {
        let raw = "{\n  \"age\": 72, # 6 years x 12\n  \"fio2\": 0.45 // from ventilator\n}";
        let value = parses(&repair_record_text(raw).unwrap());
        assert_eq!(value["age"], 72);
        assert_eq!(value["fio2"], 0.45);
    }

    #[test]
    fn hash_inside_string_is_kept() {
        let raw = r#"{"pupil": "fixed #2"}"#;
        let value = parses(&repair_record_text(raw).unwrap());
        assert_eq!(value["pupil"], "fixed #2");
    }

    #[test]
    fn python_dict_output_is_repaired() {
        let raw = "{'pid': 1, 'pupil': 'fixed', 'inr': None, 'vent': True, 'alt': NaN}";
        let value = parses(&repair_record_text(raw).unwrap());
        assert_eq!(value["pupil"], "fixed");
        assert!(value["inr"].is_null());
        assert!(value["alt"].is_null());
        assert_eq!(value["vent"], true);
    }

    #[test]
    fn apostrophe_inside_double_quotes_survives() {
        let raw = r#"{"note": "patient's pupils", "pid": 3}"#;
        let value = parses(&repair_record_text(raw).unwrap());
        assert_eq!(value["note"], "patient's pupils");
    }

    #[test]
    fn double_quote_inside_single_quotes_is_escaped() {
        let normalized = normalize_quotes(r#"{'note': 'say "hi"'}"#);
        let value = parses(&normalized);
        assert_eq!(value["note"], "say \"hi\"");
    }

    #[test]
    fn typographic_quotes_are_normalized() {
        let normalized = normalize_quotes("{\u{201C}pid\u{201D}: 5}");
        assert_eq!(parses(&normalized)["pid"], 5);
    }

    #[test]
    fn sentinels_inside_strings_are_untouched() {
        let out = substitute_sentinels(r#"{"pupil": "None", "inr": None}"#);
        assert_eq!(out, r#"{"pupil": "None", "inr": null}"#);
    }

    #[test]
    fn slash_sentinel_and_exponents() {
        let out = substitute_sentinels("{\"a\": N/A, \"b\": 1e-3}");
        let value = parses(&out);
        assert!(value["a"].is_null());
        assert!((value["b"].as_f64().unwrap() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn trailing_commas_removed() {
        let out = remove_trailing_commas("{\"a\": [1, 2,], \"b\": \"x,}\",\n}");
        let value = parses(&out);
        assert_eq!(value["b"], "x,}");
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = "Here is the JSON object:\n{\"pid\": 9}\nLet me know if you need more.";
        let value = parses(&repair_record_text(raw).unwrap());
        assert_eq!(value["pid"], 9);
    }

    #[test]
    fn no_object_is_no_structured_output() {
        let result = repair_record_text("I could not find any data in this case.");
        assert!(matches!(
            result,
            Err(ExtractionError::NoStructuredOutput { .. })
        ));
    }

    #[test]
    fn fence_language_tag_is_removed() {
        assert_eq!(strip_code_fences("```JSON\n{}\n```"), "\n{}\n");
    }
}
