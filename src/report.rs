use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::types::StepRecord;

pub const REPORT_FILE: &str = "report.json";

/// Which part of the run gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Session,
    Plan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    /// Free-form step description, e.g. the task-page marker.
    Marker(Value),
    PlanExecution { ui_plan_execution: Vec<StepRecord> },
}

/// The document written at the end of every run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunReport {
    Completed {
        task: String,
        start_url: Option<String>,
        steps: Vec<ReportEntry>,
    },
    Aborted {
        error: String,
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        steps: Vec<ReportEntry>,
    },
}

impl RunReport {
    pub fn error(&self) -> Option<&str> {
        match self {
            RunReport::Aborted { error, .. } => Some(error),
            RunReport::Completed { .. } => None,
        }
    }

    /// Every step record in execution order.
    pub fn records(&self) -> Vec<&StepRecord> {
        let steps = match self {
            RunReport::Completed { steps, .. } | RunReport::Aborted { steps, .. } => steps,
        };
        steps
            .iter()
            .filter_map(|entry| match entry {
                ReportEntry::PlanExecution { ui_plan_execution } => Some(ui_plan_execution),
                ReportEntry::Marker(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn write(&self, outdir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(outdir)?;
        let path = outdir.join(REPORT_FILE);
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, text)?;
        Ok(path)
    }
}
