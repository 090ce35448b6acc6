use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single normalized browser instruction.
///
/// Built once from planner output by [`crate::normalize::normalize_step`] and never
/// edited afterwards; a failing step is followed by a freshly planned one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Fill {
        selector: Option<String>,
        text: String,
    },
    Click {
        target: ClickTarget,
    },
    Press {
        key: String,
    },
    Scroll {
        direction: ScrollDirection,
        distance: i64,
    },
    Wait {
        seconds: f64,
    },
    Select {
        selector: Option<String>,
        value: Option<String>,
    },
    Hover {
        selector: Option<String>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Fill { .. } => "fill",
            Action::Click { .. } => "click",
            Action::Press { .. } => "press",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
            Action::Select { .. } => "select",
            Action::Hover { .. } => "hover",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickTarget {
    Selector(String),
    Text(String),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    #[default]
    Down,
    Up,
}

/// Non-error outcomes. Some of them (`NoElement`, `NoInputFound`) mean nothing
/// was touched, but they are still statuses: the caller decides what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Filled,
    FilledFirstInput,
    NoInputFound,
    Clicked,
    ClickedByText,
    ClickedByTextFallback,
    NoElement,
    NoElementByText,
    Pressed,
    Scrolled,
    Waited,
    Selected,
    Hovered,
}

/// Why an action could not be carried out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionFailure {
    #[error("no_selector_for_click")]
    ClickWithoutTarget,

    #[error("select_missing_selector_or_value")]
    SelectMissingSelectorOrValue,

    #[error("hover_no_selector")]
    HoverWithoutSelector,

    #[error("unknown_action")]
    UnknownAction,

    #[error("execute_action_failed:{0}")]
    Driver(String),
}

/// Outcome of one action. Exactly one of `status` / `error` is present in the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult {
    Status {
        status: ActionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl ActionResult {
    pub fn status(status: ActionStatus) -> Self {
        ActionResult::Status {
            status,
            detail: None,
        }
    }

    pub fn status_with(status: ActionStatus, detail: impl Into<String>) -> Self {
        ActionResult::Status {
            status,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(failure: ActionFailure) -> Self {
        ActionResult::Error {
            error: failure.to_string(),
            detail: None,
        }
    }

    pub fn failed_with(failure: ActionFailure, detail: impl Into<String>) -> Self {
        ActionResult::Error {
            error: failure.to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error { .. })
    }

    pub fn status_code(&self) -> Option<ActionStatus> {
        match self {
            ActionResult::Status { status, .. } => Some(*status),
            ActionResult::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ActionResult::Error { error, .. } => Some(error),
            ActionResult::Status { .. } => None,
        }
    }
}

/// One entry in the append-only execution log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepRecord {
    Planned {
        step_index: usize,
        step: Value,
        result: ActionResult,
    },
    Recovery {
        repl_step: ActionStep,
        repl_result: ActionResult,
    },
}

impl StepRecord {
    pub fn result(&self) -> &ActionResult {
        match self {
            StepRecord::Planned { result, .. } => result,
            StepRecord::Recovery { repl_result, .. } => repl_result,
        }
    }

    pub fn is_recovery(&self) -> bool {
        matches!(self, StepRecord::Recovery { .. })
    }
}

pub const DEFAULT_START_URL: &str = "https://www.google.com";
pub const DEFAULT_MAX_STEPS: usize = 20;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DOM_SNAPSHOT_MAX_CHARS: usize = 16_000;
