use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::ConfigError;
use crate::types::{DEFAULT_MAX_RETRIES, DEFAULT_MAX_STEPS};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl PlannerSettings {
    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

/// Run configuration, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Planned steps beyond this are dropped.
    pub max_steps: usize,
    pub headful: bool,
    pub viewport: Option<Viewport>,
    #[serde(flatten)]
    pub planner: PlannerSettings,
    /// Extra attempts per step after the first.
    pub max_retries: u32,
    pub login_timeout_secs: u64,
    pub chrome_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            headful: false,
            viewport: None,
            planner: PlannerSettings::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            login_timeout_secs: 120,
            chrome_path: None,
        }
    }
}

impl Config {
    /// Load `path` (defaults when the file does not exist) and apply
    /// `OPENAI_*` overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Config::default()
        };

        config.apply_env(env);
        Ok(config)
    }

    /// Environment values take precedence over file values.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = set("OPENAI_API_KEY") {
            self.planner.api_key = Some(key);
        }
        if let Some(model) = set("OPENAI_MODEL") {
            self.planner.model = model;
        }
        if let Some(endpoint) = set("OPENAI_ENDPOINT") {
            self.planner.endpoint = endpoint;
        }
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn window_size(&self) -> Option<(u32, u32)> {
        self.viewport.map(|v| (v.width, v.height))
    }
}
