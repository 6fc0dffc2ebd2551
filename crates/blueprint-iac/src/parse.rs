use serde_json::{Map, Value};

use crate::{GeneratedIac, IacFormat};

/// Parse raw LLM output into generated IaC.
///
/// The model is asked for a bare JSON envelope, but responses arrive in every
/// shape: fenced, prefixed with prose, with trailing commas. Recovery order:
/// balanced JSON objects carrying the format's code key (largest candidate
/// first), then a fenced code block, then the raw text itself.
pub fn parse_llm_output(raw: &str, format: IacFormat) -> GeneratedIac {
    let mut candidates = find_balanced_objects(raw);
    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));

    for candidate in &candidates {
        if let Some(result) = envelope_from_json(candidate, format) {
            return result;
        }
        let repaired = strip_trailing_commas(candidate);
        if let Some(result) = envelope_from_json(&repaired, format) {
            return result;
        }
    }

    if let Some(block) = extract_fenced_block(raw) {
        return GeneratedIac {
            code: block,
            parameters: Map::new(),
        };
    }

    GeneratedIac {
        code: raw.trim().to_string(),
        parameters: Map::new(),
    }
}

fn envelope_from_json(candidate: &str, format: IacFormat) -> Option<GeneratedIac> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let obj = value.as_object()?;
    let code = obj.get(format.code_key())?.as_str()?.to_string();
    if code.trim().is_empty() {
        return None;
    }
    let parameters = obj
        .get("parameters")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some(GeneratedIac { code, parameters })
}

/// All balanced-brace substrings that look like JSON objects. String
/// literals are honored so braces inside code payloads don't split objects.
fn find_balanced_objects(text: &str) -> Vec<&str> {
    let mut results = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push(i),
            '}' => {
                if let Some(start) = stack.pop() {
                    results.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    results
}

/// Remove commas that directly precede a closing brace or bracket, outside
/// string literals.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '}' | ']' => {
                let trimmed_len = out.trim_end().len();
                if out[..trimmed_len].ends_with(',') {
                    out.truncate(trimmed_len - 1);
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Extract the body of the first fenced code block, skipping the optional
/// language tag on the opening line.
fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    let block = body[..end].trim();
    if block.is_empty() {
        None
    } else {
        Some(block.to_string())
    }
}
