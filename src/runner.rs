use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::brain::{Brain, LanguageModel, PlannerResponse};
use crate::executor::ActionExecutor;
use crate::hands::BrowserDriver;
use crate::normalize::normalize_step;
use crate::prompts::recovery_prompt;
use crate::recorder::{StateRecorder, StepPayload};
use crate::types::{ActionFailure, ActionResult, StepRecord};

/// Why a planner reply could not be used as a plan.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("ui_plan_not_parseable")]
    NotParseable { raw: Value },

    #[error("ui_plan_not_list")]
    NotList { raw: Value },

    #[error("{message}")]
    Planner { message: String },
}

impl PlanError {
    pub fn raw(&self) -> Option<&Value> {
        match self {
            PlanError::NotParseable { raw } | PlanError::NotList { raw } => Some(raw),
            PlanError::Planner { .. } => None,
        }
    }
}

/// The ordered step list in a planner reply. A bare array is the plan; an
/// object is accepted when it wraps one under `plan` or `steps`.
pub fn plan_from_response(response: &PlannerResponse) -> Result<Vec<Value>, PlanError> {
    match response {
        PlannerResponse::Structured(Value::Array(steps)) => Ok(steps.clone()),
        PlannerResponse::Structured(value) => ["plan", "steps"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_array))
            .cloned()
            .ok_or_else(|| PlanError::NotList { raw: value.clone() }),
        PlannerResponse::Unstructured(_) => Err(PlanError::NotParseable {
            raw: response.to_json(),
        }),
        PlannerResponse::Error(message) => Err(PlanError::Planner {
            message: message.clone(),
        }),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Runs a plan step by step with per-step retry and one planner-supplied
/// corrective action when a step keeps failing.
pub struct PlanRunner<'r, 'a, D, L> {
    executor: ActionExecutor<'a, D>,
    brain: &'a Brain<L>,
    recorder: &'r mut StateRecorder<'a, D>,
    task: &'a str,
    policy: RetryPolicy,
    records: Vec<StepRecord>,
}

impl<'r, 'a, D: BrowserDriver, L: LanguageModel> PlanRunner<'r, 'a, D, L> {
    pub fn new(
        driver: &'a D,
        brain: &'a Brain<L>,
        recorder: &'r mut StateRecorder<'a, D>,
        task: &'a str,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            executor: ActionExecutor::new(driver),
            brain,
            recorder,
            task,
            policy,
            records: Vec::new(),
        }
    }

    pub async fn run(mut self, plan: &[Value]) -> Vec<StepRecord> {
        info!("Executing UI plan ({} steps)", plan.len());
        for (idx, raw) in plan.iter().enumerate() {
            let result = self.run_step(raw).await;
            self.records.push(StepRecord::Planned {
                step_index: idx,
                step: raw.clone(),
                result: result.clone(),
            });

            let dom = self.recorder.current_dom().await;
            self.recorder.save_step(
                idx + 1,
                StepPayload::Action {
                    plan: raw.clone(),
                    action_result: result.clone(),
                },
                Some(&dom),
            );

            if result.is_error() {
                warn!("Step {} failed: {:?}. Asking planner for recovery", idx, result);
                self.recover(raw, &result, dom).await;
            }
        }
        self.records
    }

    async fn run_step(&self, raw: &Value) -> ActionResult {
        let step = match normalize_step(raw) {
            Ok(step) => step,
            Err(e) => {
                return ActionResult::failed_with(ActionFailure::UnknownAction, e.to_string());
            }
        };

        let mut attempt = 0;
        loop {
            let result = self.executor.execute(&step).await;
            if !result.is_error() || attempt >= self.policy.max_retries {
                return result;
            }
            attempt += 1;
            info!(
                "Retrying {} ({}/{}) after {:?}",
                step.action.kind(),
                attempt,
                self.policy.max_retries,
                result
            );
            tokio::time::sleep(self.policy.backoff).await;
        }
    }

    /// One corrective action, executed once, recorded next to the failure.
    async fn recover(&mut self, failed: &Value, result: &ActionResult, dom: String) {
        let prompt = recovery_prompt(self.task, failed, result, &dom);
        let response = self.brain.plan(&prompt).await;

        let PlannerResponse::Structured(value) = &response else {
            warn!("No corrective action from planner: {:?}", response);
            return;
        };
        if value.get("verdict").and_then(Value::as_str) == Some("done") {
            info!("Planner reports the task is already complete");
            return;
        }

        match normalize_step(value) {
            Ok(action) => {
                info!("Executing recovery action from planner: {:?}", action.action);
                let repl_result = self.executor.execute(&action).await;
                self.records.push(StepRecord::Recovery {
                    repl_step: action,
                    repl_result,
                });
            }
            Err(e) => warn!("Ignoring malformed recovery action {}: {}", value, e),
        }
    }
}
