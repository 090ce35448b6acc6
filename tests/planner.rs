mod common;

use agentic_rpa::error::LlmError;
use agentic_rpa::{Brain, PlannerResponse};
use common::ScriptedModel;
use serde_json::json;
use std::time::Duration;

fn transport(msg: &str) -> Result<String, LlmError> {
    Err(LlmError::Transport(msg.into()))
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_once() {
    let brain = Brain::new(ScriptedModel::new([
        transport("connection reset"),
        Ok(r#"```json
[{"action": "press", "key": "Enter"}]
```"#
            .to_string()),
    ]));

    let started = tokio::time::Instant::now();
    let response = brain.plan("plan it").await;
    assert_eq!(
        response,
        PlannerResponse::Structured(json!([{"action": "press", "key": "Enter"}]))
    );
    assert_eq!(brain.model().prompts().len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_second_transient_failure_gives_up() {
    let brain = Brain::new(ScriptedModel::new([
        transport("connection reset"),
        Err(LlmError::Api {
            status: 503,
            message: "overloaded".into(),
        }),
        Ok("[]".to_string()),
    ]))
    .with_retry_backoff(Duration::from_millis(10));

    let response = brain.plan("plan it").await;
    assert_eq!(
        response,
        PlannerResponse::Error("HTTP error after retry: API error (503): overloaded".into())
    );
    assert_eq!(brain.model().prompts().len(), 2);
}

#[tokio::test]
async fn test_empty_reply_is_not_retried() {
    let brain = Brain::new(ScriptedModel::new([
        Err(LlmError::NoCandidates),
        Ok("[]".to_string()),
    ]));

    assert_eq!(
        brain.plan("plan it").await,
        PlannerResponse::Error("No candidates".into())
    );
    assert_eq!(brain.model().prompts().len(), 1);
}

#[tokio::test]
async fn test_error_key_becomes_error_variant() {
    let brain = Brain::new(ScriptedModel::replying(&[
        r#"{"error": "rate limited"}"#,
    ]));
    let response = brain.plan("plan it").await;
    assert!(response.is_error());
    assert_eq!(response.to_json(), json!({"error": "rate limited"}));
}

#[tokio::test]
async fn test_repairable_reply_is_structured() {
    let brain = Brain::new(ScriptedModel::replying(&[
        "Here you go: {action: 'click', selector: '#go'} hope it helps",
    ]));
    assert_eq!(
        brain.plan("next step").await,
        PlannerResponse::Structured(json!({"action": "click", "selector": "#go"}))
    );
}

#[tokio::test]
async fn test_prose_reply_is_unstructured() {
    let brain = Brain::new(ScriptedModel::replying(&["I would click the blue button."]));
    let response = brain.plan("next step").await;
    assert_eq!(
        response,
        PlannerResponse::Unstructured("I would click the blue button.".into())
    );
    assert_eq!(response.url(), None);
}
