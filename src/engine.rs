//! One end-to-end run: session, task page, plan, execution, report.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::brain::{Brain, LanguageModel};
use crate::config::Config;
use crate::hands::BrowserDriver;
use crate::prompts::{task_url_prompt, ui_plan_prompt};
use crate::recorder::{StateRecorder, StepPayload};
use crate::report::{ReportEntry, RunReport, Stage};
use crate::runner::{PlanRunner, RetryPolicy, plan_from_response};
use crate::session::{LoginTimings, SessionManager};
use crate::types::DEFAULT_START_URL;
use crate::urls::clean_url;

pub const SESSION_FILE: &str = "cookies.json";

#[derive(Debug, Clone, Copy)]
pub struct AgentOptions {
    pub max_steps: usize,
    pub retry: RetryPolicy,
    pub login: LoginTimings,
    /// Pause after each top-level navigation.
    pub navigation_settle: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: crate::types::DEFAULT_MAX_STEPS,
            retry: RetryPolicy::default(),
            login: LoginTimings::default(),
            navigation_settle: Duration::from_secs(2),
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_steps: config.max_steps,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                ..defaults.retry
            },
            login: LoginTimings {
                timeout: config.login_timeout(),
                ..defaults.login
            },
            ..defaults
        }
    }
}

pub struct Agent<D, L> {
    driver: D,
    brain: Brain<L>,
    outdir: PathBuf,
    options: AgentOptions,
}

impl<D: BrowserDriver, L: LanguageModel> Agent<D, L> {
    pub fn new(driver: D, brain: Brain<L>, outdir: impl Into<PathBuf>, options: AgentOptions) -> Self {
        Self {
            driver,
            brain,
            outdir: outdir.into(),
            options,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn brain(&self) -> &Brain<L> {
        &self.brain
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Execute `task` and describe what happened. Never fails: every abort
    /// becomes an error report.
    pub async fn run(&self, task: &str, start_url: Option<&str>) -> RunReport {
        let start = start_url
            .and_then(clean_url)
            .unwrap_or_else(|| DEFAULT_START_URL.to_string());

        if let Err(e) = std::fs::create_dir_all(&self.outdir) {
            warn!("Could not create {}: {}", self.outdir.display(), e);
        }

        info!("Opening start page {}", start);
        self.goto(&start).await;

        let session = SessionManager::new(
            &self.driver,
            &self.brain,
            self.outdir.join(SESSION_FILE),
            self.options.login,
        )
        .establish(task, &start)
        .await;
        if !session.is_authenticated() {
            return RunReport::Aborted {
                error: "login_timeout".into(),
                stage: Stage::Session,
                raw: None,
                steps: Vec::new(),
            };
        }

        let mut recorder = StateRecorder::new(&self.driver, self.outdir.clone());
        let mut steps = Vec::new();

        let task_url = self.resolve_task_url(task, &start).await;
        info!("Navigating to task page {}", task_url);
        self.goto(&task_url).await;

        recorder.capture_if_changed("task_page_loaded").await;
        let aligned = recorder.capture("aligned_authenticated_page").await;

        let marker = json!({"step": 0, "action": "task_page_ready", "url": task_url});
        recorder.save_step(
            0,
            StepPayload::Data {
                data: marker.clone(),
                extra: None,
            },
            Some(&aligned.dom),
        );
        steps.push(ReportEntry::Marker(marker));

        let dom = recorder.current_dom().await;
        info!("Requesting UI plan from planner");
        let response = self.brain.plan(&ui_plan_prompt(task, &dom)).await;
        let mut plan = match plan_from_response(&response) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Unusable UI plan: {}", e);
                return RunReport::Aborted {
                    error: e.to_string(),
                    stage: Stage::Plan,
                    raw: e.raw().cloned(),
                    steps,
                };
            }
        };

        if plan.len() > self.options.max_steps {
            warn!(
                "Plan has {} steps, keeping the first {}",
                plan.len(),
                self.options.max_steps
            );
            plan.truncate(self.options.max_steps);
        }

        let records = PlanRunner::new(
            &self.driver,
            &self.brain,
            &mut recorder,
            task,
            self.options.retry,
        )
        .run(&plan)
        .await;
        steps.push(ReportEntry::PlanExecution {
            ui_plan_execution: records,
        });

        info!("Task finished");
        RunReport::Completed {
            task: task.to_string(),
            start_url: start_url.map(str::to_string),
            steps,
        }
    }

    /// The planner's guess at the page where the task happens, falling back to
    /// wherever the browser already is.
    async fn resolve_task_url(&self, task: &str, start: &str) -> String {
        if let Some(url) = self.brain.plan(&task_url_prompt(task)).await.url() {
            return url;
        }
        warn!("Planner gave no usable task URL, staying on the current page");
        self.driver
            .current_url()
            .await
            .ok()
            .and_then(|url| clean_url(&url))
            .unwrap_or_else(|| start.to_string())
    }

    async fn goto(&self, url: &str) {
        if let Err(e) = self.driver.navigate(url).await {
            warn!("Navigation to {} failed: {}", url, e);
        }
        tokio::time::sleep(self.options.navigation_settle).await;
    }
}
