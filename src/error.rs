use thiserror::Error;

/// Failures raised by a [`crate::hands::BrowserDriver`].
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("script error: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<anyhow::Error> for DriverError {
    fn from(err: anyhow::Error) -> Self {
        DriverError::Browser(format!("{:#}", err))
    }
}

/// Failures talking to the language model.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No candidates")]
    NoCandidates,

    #[error("Empty model response")]
    EmptyResponse,
}

impl LlmError {
    /// Network and HTTP-status failures are worth one more try; a well-formed
    /// reply with nothing in it is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transport(_) | LlmError::Api { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("planner API key not set (config `api_key` or OPENAI_API_KEY)")]
    MissingApiKey,
}

pub type Result<T> = std::result::Result<T, DriverError>;
