use serde_json::{Value, json};

use crate::dom::trim_snapshot;
use crate::types::{ActionResult, DOM_SNAPSHOT_MAX_CHARS};

pub fn base_url_prompt(task: &str) -> String {
    format!(
        "Task: {task}\n\
         Respond with ONLY the clean base website URL (e.g., https://linear.app) where this task would be performed. \
         Do not include /login or any explanations - only the root URL."
    )
}

pub fn task_url_prompt(task: &str) -> String {
    format!(
        "Task: {task}\n\
         You are to output ONLY the clean, fully qualified URL (https...) where this task can be done. \
         Do not include quotes, backticks, or explanations - just the URL itself."
    )
}

/// Ask for the whole plan as a strict JSON array of in-page steps.
pub fn ui_plan_prompt(task: &str, dom_snapshot: &str) -> String {
    let example = json!([
        {
            "action": "click",
            "selector": "button[data-testid='new-project']",
            "desc": "Click the New Project button to open the 'Create project' modal"
        },
        {
            "action": "type",
            "selector": "input[name='name']",
            "value": "AI Test Project",
            "desc": "Type the project name into the name input"
        },
        {
            "action": "click",
            "selector": "button[type='submit']",
            "desc": "Click the Create/Save button to create the project"
        }
    ]);
    let example = serde_json::to_string_pretty(&example).unwrap_or_default();
    let dom = trim_snapshot(dom_snapshot, DOM_SNAPSHOT_MAX_CHARS);

    format!(
        r#"You are a precise browser automation planner. The user task is:
{task}

Here is the current DOM snapshot (trimmed):
{dom}

Produce a JSON array (and ONLY a JSON array) of step objects. Each step object must include:
  - "action": one of ["click","type","select","wait","press","scroll","hover"]
  - "selector": CSS selector to target the element (required for click/type/select/hover)
  - For typing/select: "value" (or "text")
  - "desc": short human-readable micro-detailed description of the step

Important constraints:
- Do NOT return navigation by constructing or changing the URL. Use in-page actions only (clicks, presses).
- Each step must be atomic and micro-detailed (no merging steps).
- Prefer stable selectors (data- attributes, role-based selectors). If impossible, use CSS that clearly targets the intended element.
- If waiting for elements is necessary, include an explicit step with action "wait" and "selector" or "seconds".
- Keep the plan focused to complete the user's high-level task without side effects.

Example output (strict JSON):
{example}

Return only JSON."#
    )
}

/// Ask for one corrective step after `failed_step` ended in `result`.
pub fn recovery_prompt(
    task: &str,
    failed_step: &Value,
    result: &ActionResult,
    dom_snapshot: &str,
) -> String {
    let step = serde_json::to_string(failed_step).unwrap_or_default();
    let result = serde_json::to_string(result).unwrap_or_default();
    let dom = trim_snapshot(dom_snapshot, DOM_SNAPSHOT_MAX_CHARS);

    format!(
        r#"You are an expert UI automation planner. High-level task:
{task}

Previous plan:
{step}

Action result:
{result}

Current HTML snapshot (trimmed):
{dom}

Did the last action make progress? If yes, plan the next single action in JSON format:
  {{ "action": "<click|type|press|scroll|wait|select|hover>", "selector": "<css selector>", "text|value": "<text if needed>", "desc": "<short human description>" }}
If the task is complete, respond with: {{ "verdict":"done" }}.
Answer ONLY with the JSON object."#
    )
}
