//! Pull JSON out of free-form model output.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref BARE_KEY: Regex =
        Regex::new(r"([\{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)\s*:").unwrap();
}

/// First JSON object or array embedded in `text`.
///
/// Candidate spans are the balanced `{...}` / `[...]` regions in order of
/// appearance. Each is parsed strictly, then once more after a forgiving
/// repair; a span that fails both is skipped and scanning resumes after it.
pub fn extract_json(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(['{', '[']) {
        let start = cursor + offset;
        let Some(end) = balanced_end(bytes, start) else {
            cursor = start + 1;
            continue;
        };

        let span = &text[start..=end];
        if let Some(value) = parse_strict(span).or_else(|| parse_repaired(span)) {
            return Some(value);
        }
        cursor = end + 1;
    }

    None
}

fn parse_strict(span: &str) -> Option<Value> {
    serde_json::from_str(span).ok()
}

/// Single quotes become double quotes and bare object keys get quoted.
fn parse_repaired(span: &str) -> Option<Value> {
    let swapped = span.replace('\'', "\"");
    let quoted = BARE_KEY.replace_all(&swapped, "$1\"$2\":");
    serde_json::from_str(&quoted).ok()
}

/// Index of the bracket closing the one at `start`, skipping over string
/// literals in either quote style.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == quote {
                in_string = None;
            }
            continue;
        }

        match b {
            b'"' | b'\'' => in_string = Some(b),
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
