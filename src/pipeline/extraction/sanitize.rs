// Sanitize case narratives before they are embedded in the extraction prompt.
// Removes invisible Unicode and instruction-override lines, normalizes
// whitespace, and caps the length.

/// Maximum narrative length sent to the service (characters).
const MAX_NARRATIVE_LENGTH: usize = 20_000;

/// Sanitize a narrative for prompt embedding, logging removed lines against
/// the patient id (never the content).
pub fn sanitize_narrative(raw: &str, patient_id: i64) -> String {
    let cleaned = remove_invisible_chars(raw);
    let (no_injection, removed) = remove_override_lines(&cleaned);

    if removed > 0 {
        tracing::warn!(
            patient_id,
            removed_lines = removed,
            "Instruction-like lines removed from case narrative"
        );
    }

    let normalized = normalize_whitespace(&no_injection);
    truncate_chars(&normalized, MAX_NARRATIVE_LENGTH)
}

/// Remove zero-width, bidi-control and other control characters.
/// Keeps space, newline, tab and carriage return.
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t' | '\r') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

fn is_role_marker(lower: &str) -> bool {
    const MARKERS: &[&str] = &[
        "system:",
        "assistant:",
        "user:",
        "[system]",
        "[assistant]",
        "[inst]",
        "[/inst]",
        "<<sys>>",
        "note to ai:",
        "</case>",
        "<case>",
    ];
    MARKERS.iter().any(|m| lower.starts_with(m))
}

fn is_override_attempt(lower: &str) -> bool {
    const PHRASES: &[&str] = &[
        "ignore previous instructions",
        "ignore all instructions",
        "ignore the above instructions",
        "disregard your instructions",
        "disregard all instructions",
        "forget your instructions",
        "new instructions:",
        "override:",
    ];
    PHRASES.iter().any(|p| lower.contains(p))
}

/// Drop lines that try to speak to the service instead of describing the case.
/// Returns (cleaned_text, removed_line_count).
fn remove_override_lines(text: &str) -> (String, usize) {
    let mut kept = Vec::new();
    let mut removed = 0usize;

    for line in text.lines() {
        let lower = line.trim().to_lowercase();
        if is_role_marker(&lower) || is_override_attempt(&lower) {
            removed += 1;
        } else {
            kept.push(line);
        }
    }

    (kept.join("\n"), removed)
}

/// Collapse runs of blank lines, trim each line and the ends.
fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_blank = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_blank {
                lines.push("");
                prev_blank = true;
            }
        } else {
            lines.push(trimmed);
            prev_blank = false;
        }
    }

    while lines.first() == Some(&"") {
        lines.remove(0);
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }

    lines.join("\n")
}

/// Truncate to `max_chars`, breaking at the last whitespace before the limit.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    match head.rfind(char::is_whitespace) {
        Some(pos) => format!("{}…[TRUNCATED]", &head[..pos]),
        None => format!("{head}…[TRUNCATED]"),
    }
}
