use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::hands::BrowserDriver;
use crate::types::ActionResult;

const NO_DOM_PLACEHOLDER: &str = "<no DOM captured>";

/// DOM text plus the screenshot written for it, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub dom: String,
    pub screenshot: Option<PathBuf>,
}

/// Per-run capture bookkeeping. Labels already captured and the last DOM seen
/// live here, so two runs never share them.
pub struct StateRecorder<'a, D> {
    driver: &'a D,
    outdir: PathBuf,
    captured: HashSet<String>,
    last_dom: Option<String>,
}

impl<'a, D: BrowserDriver> StateRecorder<'a, D> {
    pub fn new(driver: &'a D, outdir: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            outdir: outdir.into(),
            captured: HashSet::new(),
            last_dom: None,
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// DOM and full-page screenshot for `label`, once per label. Repeat calls
    /// return an empty snapshot without touching the browser.
    pub async fn capture(&mut self, label: &str) -> Snapshot {
        if !self.captured.insert(label.to_string()) {
            debug!("Already captured '{}'", label);
            return Snapshot::default();
        }

        let dom = match self.driver.content().await {
            Ok(dom) => dom,
            Err(e) => {
                warn!("capture failed for '{}': {}", label, e);
                NO_DOM_PLACEHOLDER.to_string()
            }
        };

        let path = self.outdir.join(format!("{}.png", label));
        let screenshot = match self.driver.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("screenshot failed for '{}': {}", label, e);
                None
            }
        };

        Snapshot { dom, screenshot }
    }

    /// Like [`capture`](Self::capture) but skipped when the DOM is byte-identical
    /// to the last one captured this way.
    pub async fn capture_if_changed(&mut self, label: &str) -> Snapshot {
        let dom = match self.driver.content().await {
            Ok(dom) => dom,
            Err(e) => {
                warn!("Snapshot capture failed for '{}': {}", label, e);
                return Snapshot::default();
            }
        };

        if self.last_dom.as_deref() == Some(dom.as_str()) {
            info!("Skipping duplicate snapshot for '{}'", label);
            return Snapshot {
                dom,
                screenshot: None,
            };
        }

        self.last_dom = Some(dom);
        self.capture(label).await
    }

    /// DOM text for prompting or metadata; empty when the page can't be read.
    pub async fn current_dom(&self) -> String {
        self.driver.content().await.unwrap_or_else(|e| {
            warn!("Could not read DOM: {}", e);
            String::new()
        })
    }

    pub fn save_step(&self, step_index: usize, payload: StepPayload, dom: Option<&str>) {
        save_step_metadata(&self.outdir, step_index, payload, dom);
    }
}

/// What a metadata file records besides index and timestamp.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StepPayload {
    Data {
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        extra: Option<Value>,
    },
    Action {
        plan: Value,
        action_result: ActionResult,
    },
}

#[derive(Serialize)]
struct StepMetadata {
    step_index: usize,
    timestamp: String,
    #[serde(flatten)]
    payload: StepPayload,
}

/// Write `step_NNN_meta.json` and, when there is DOM text, `step_NNN_dom.html`.
/// Failures are logged, never returned.
pub fn save_step_metadata(outdir: &Path, step_index: usize, payload: StepPayload, dom: Option<&str>) {
    if let Err(e) = std::fs::create_dir_all(outdir) {
        warn!("Failed to create {}: {}", outdir.display(), e);
        return;
    }

    let metadata = StepMetadata {
        step_index,
        timestamp: Local::now().format("%Y%m%d_%H%M%S").to_string(),
        payload,
    };

    let meta_path = outdir.join(format!("step_{:03}_meta.json", step_index));
    let written = serde_json::to_string_pretty(&metadata)
        .map_err(|e| e.to_string())
        .and_then(|text| std::fs::write(&meta_path, text).map_err(|e| e.to_string()));
    if let Err(e) = written {
        warn!("Failed to save metadata for step {}: {}", step_index, e);
    }

    if let Some(dom) = dom.filter(|d| !d.trim().is_empty()) {
        let dom_path = outdir.join(format!("step_{:03}_dom.html", step_index));
        if let Err(e) = std::fs::write(&dom_path, dom) {
            warn!("Failed to save DOM snapshot for step {}: {}", step_index, e);
        }
    }

    debug!("Saved metadata for step {}", step_index);
}
