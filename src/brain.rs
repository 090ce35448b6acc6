use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PlannerSettings;
use crate::error::LlmError;
use crate::extract::extract_json;
use crate::urls::{clean_url, find_http_url};

/// A text-in, text-out language model.
#[async_trait(?Send)]
pub trait LanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(settings: &PlannerSettings, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
        })
    }
}

#[async_trait(?Send)]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": 0.0,
                "max_tokens": 2048,
            }))
            .send()
            .await?;

        let status = response.status();
        let json_resp: Value = response.json().await?;

        if !status.is_success() {
            let message = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let choices = json_resp["choices"].as_array().ok_or(LlmError::NoCandidates)?;
        let first = choices.first().ok_or(LlmError::NoCandidates)?;
        let content = first["message"]["content"].as_str().unwrap_or("").trim();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!("LLM says: {}", content);
        Ok(content.to_string())
    }
}

/// What came back from the planner, with the three cases kept apart.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerResponse {
    /// A JSON object or array found in the reply.
    Structured(Value),
    /// Text with nothing parseable in it.
    Unstructured(String),
    /// Transport failure, empty reply, or a reply carrying an `error` key.
    Error(String),
}

impl PlannerResponse {
    pub fn from_text(text: &str) -> Self {
        match extract_json(text) {
            Some(Value::Object(obj)) if obj.contains_key("error") => {
                let message = match &obj["error"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                PlannerResponse::Error(message)
            }
            Some(value) => PlannerResponse::Structured(value),
            None => PlannerResponse::Unstructured(text.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlannerResponse::Error(_))
    }

    /// A navigable URL from a `{url}` object or from free text.
    pub fn url(&self) -> Option<String> {
        let text = match self {
            PlannerResponse::Structured(v) => v.get("url").and_then(Value::as_str)?,
            PlannerResponse::Unstructured(text) => text.as_str(),
            PlannerResponse::Error(_) => return None,
        };
        clean_url(find_http_url(text).unwrap_or(text))
    }

    /// JSON form used in reports: structured values as-is, raw text as
    /// `{raw_text}`, errors as `{error}`.
    pub fn to_json(&self) -> Value {
        match self {
            PlannerResponse::Structured(v) => v.clone(),
            PlannerResponse::Unstructured(text) => json!({ "raw_text": text }),
            PlannerResponse::Error(message) => json!({ "error": message }),
        }
    }
}

impl Serialize for PlannerResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// The planner gateway: sends prompts and turns whatever comes back into a
/// [`PlannerResponse`]. Never fails outward.
pub struct Brain<L> {
    model: L,
    retry_backoff: Duration,
}

impl<L: LanguageModel> Brain<L> {
    pub fn new(model: L) -> Self {
        Self {
            model,
            retry_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn model(&self) -> &L {
        &self.model
    }

    /// Transport failures get exactly one retry after the backoff.
    pub async fn plan(&self, prompt: &str) -> PlannerResponse {
        let mut retried = false;
        let text = loop {
            match self.model.complete(prompt).await {
                Ok(text) => break text,
                Err(e) if e.is_transient() && !retried => {
                    warn!("Planner request failed, retrying once: {}", e);
                    retried = true;
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) if retried => {
                    return PlannerResponse::Error(format!("HTTP error after retry: {}", e));
                }
                Err(e) => return PlannerResponse::Error(e.to_string()),
            }
        };

        PlannerResponse::from_text(&text)
    }
}
