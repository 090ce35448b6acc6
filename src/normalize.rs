//! Boundary between loosely shaped planner steps and [`ActionStep`].
//!
//! The planner is asked for a fixed schema but routinely answers with synonyms
//! (`type` for `fill`, `sel` for `selector`, `text` for `value`). Every alias is
//! resolved here so the executor only ever sees the canonical shape.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Action, ActionStep, ClickTarget, ScrollDirection};

const KIND_KEYS: &[&str] = &["action", "type", "kind"];
const SELECTOR_KEYS: &[&str] = &["selector", "sel", "query"];
const VALUE_KEYS: &[&str] = &["value", "text", "fill"];
const DESCRIPTION_KEYS: &[&str] = &["desc", "description"];

const DEFAULT_KEY: &str = "Enter";
const DEFAULT_SCROLL_DISTANCE: i64 = 500;
const DEFAULT_WAIT_SECONDS: f64 = 1.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("step is not an object")]
    NotAnObject,

    #[error("step has no action kind")]
    MissingKind,

    #[error("unknown action kind '{0}'")]
    UnknownKind(String),
}

pub fn normalize_step(raw: &Value) -> Result<ActionStep, NormalizeError> {
    let obj = raw.as_object().ok_or(NormalizeError::NotAnObject)?;
    let kind = first_str(obj, KIND_KEYS).ok_or(NormalizeError::MissingKind)?;
    let selector = first_str(obj, SELECTOR_KEYS).map(str::to_string);
    let value = first_str(obj, VALUE_KEYS).map(str::to_string);

    let action = match kind.to_ascii_lowercase().as_str() {
        "fill" | "type" | "set_value" => Action::Fill {
            selector,
            text: value.unwrap_or_default(),
        },
        "click" => {
            let target = match (selector, text_target(obj)) {
                (Some(sel), _) => ClickTarget::Selector(sel),
                (None, Some(text)) => ClickTarget::Text(text),
                (None, None) => ClickTarget::Missing,
            };
            Action::Click { target }
        }
        "press" => Action::Press {
            key: obj
                .get("key")
                .and_then(Value::as_str)
                .filter(|k| !k.is_empty())
                .unwrap_or(DEFAULT_KEY)
                .to_string(),
        },
        "scroll" => Action::Scroll {
            direction: match obj.get("direction").and_then(Value::as_str) {
                Some(d) if d.eq_ignore_ascii_case("up") => ScrollDirection::Up,
                _ => ScrollDirection::Down,
            },
            distance: obj
                .get("distance")
                .and_then(loose_i64)
                .unwrap_or(DEFAULT_SCROLL_DISTANCE),
        },
        "wait" => Action::Wait {
            seconds: obj
                .get("seconds")
                .and_then(loose_f64)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .unwrap_or(DEFAULT_WAIT_SECONDS),
        },
        "select" | "select_option" => Action::Select {
            selector,
            // `text` is accepted for fill but a select needs an explicit value
            value: obj.get("value").and_then(scalar_string),
        },
        "hover" => Action::Hover { selector },
        other => return Err(NormalizeError::UnknownKind(other.to_string())),
    };

    Ok(ActionStep {
        action,
        description: first_str(obj, DESCRIPTION_KEYS).map(str::to_string),
    })
}

/// Text to click by. A bare `text` without a selector is treated the same as
/// `{by_text: true, text}`.
fn text_target(obj: &Map<String, Value>) -> Option<String> {
    obj.get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|v| !v.is_empty())
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_i64(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn loose_f64(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
