mod common;

use agentic_rpa::recorder::StateRecorder;
use agentic_rpa::runner::{PlanRunner, RetryPolicy};
use agentic_rpa::{ActionResult, ActionStatus, Brain, StepRecord};
use common::{APP_PAGE, FakeBrowser, Outcome, RECOVERY_MARKER, ScriptedModel};
use serde_json::{Value, json};
use std::time::Duration;

const TASK: &str = "create a project called Alpha";

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_millis(500),
    }
}

async fn run_plan(
    browser: &FakeBrowser,
    brain: &Brain<ScriptedModel>,
    outdir: &std::path::Path,
    plan: Value,
) -> Vec<StepRecord> {
    let plan = plan.as_array().cloned().unwrap();
    let mut recorder = StateRecorder::new(browser, outdir);
    PlanRunner::new(browser, brain, &mut recorder, TASK, policy())
        .run(&plan)
        .await
}

#[tokio::test(start_paused = true)]
async fn test_missing_element_is_a_status_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    let brain = Brain::new(ScriptedModel::default());

    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "click", "selector": "#missing"}]),
    )
    .await;

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].result(),
        &ActionResult::status_with(ActionStatus::NoElement, "#missing")
    );
    assert_eq!(browser.count("click:#missing"), 1);
    assert!(brain.model().prompts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_step_succeeds_on_third_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    browser.script_clicks(
        "#submit",
        [
            Outcome::Fail("detached node".into()),
            Outcome::Fail("detached node".into()),
            Outcome::Found,
        ],
    );
    let brain = Brain::new(ScriptedModel::default());

    let started = tokio::time::Instant::now();
    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "click", "selector": "#submit"}]),
    )
    .await;

    assert_eq!(browser.count("click:#submit"), 3);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result().status_code(), Some(ActionStatus::Clicked));
    assert_eq!(brain.model().prompts_containing(RECOVERY_MARKER), 0);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_trigger_one_recovery_action() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    browser.add_element("#name");
    browser.script_clicks("#go", (0..3).map(|_| Outcome::Fail("timeout".into())));
    let brain = Brain::new(ScriptedModel::replying(&[
        r##"{"action": "type", "selector": "#name", "value": "Alpha"}"##,
    ]));

    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "click", "selector": "#go"}]),
    )
    .await;

    assert_eq!(browser.count("click:#go"), 3);
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].result().error_message(),
        Some("execute_action_failed:browser error: timeout")
    );
    assert!(records[1].is_recovery());
    assert_eq!(records[1].result().status_code(), Some(ActionStatus::Filled));
    assert_eq!(browser.count("fill:#name=Alpha"), 1);

    let prompts = brain.model().prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(RECOVERY_MARKER));
    assert!(prompts[0].contains(TASK));
    assert!(prompts[0].contains("#go"));
}

#[tokio::test(start_paused = true)]
async fn test_done_verdict_skips_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    let brain = Brain::new(ScriptedModel::replying(&[r#"{ "verdict": "done" }"#]));

    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "hover"}]),
    )
    .await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result().error_message(), Some("hover_no_selector"));
    assert_eq!(brain.model().prompts_containing(RECOVERY_MARKER), 1);
}

#[tokio::test(start_paused = true)]
async fn test_select_without_value_fails_and_records_once() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    browser.add_element("#team");
    let brain = Brain::new(ScriptedModel::default());

    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "select", "selector": "#team"}]),
    )
    .await;

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].result().error_message(),
        Some("select_missing_selector_or_value")
    );
    assert_eq!(browser.count("select:"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_action_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    let brain = Brain::new(ScriptedModel::default());

    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "navigate", "url": "https://elsewhere.test"}, {"action": "press"}]),
    )
    .await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].result().error_message(), Some("unknown_action"));
    assert_eq!(records[1].result().status_code(), Some(ActionStatus::Pressed));
    assert_eq!(browser.count("navigate:"), 0);
    assert_eq!(browser.count("press:Enter"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_step_metadata_written_per_step() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    browser.add_element("#submit");
    let brain = Brain::new(ScriptedModel::default());

    run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([
            {"action": "wait", "seconds": 2},
            {"action": "click", "selector": "#submit"}
        ]),
    )
    .await;

    let meta: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("step_002_meta.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(meta["step_index"], 2);
    assert_eq!(meta["plan"]["selector"], "#submit");
    assert_eq!(meta["action_result"]["status"], "clicked");
    assert!(dir.path().join("step_001_meta.json").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("step_002_dom.html")).unwrap(),
        APP_PAGE
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_recovery_action_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::on_page(APP_PAGE);
    browser.script_clicks("#go", (0..3).map(|_| Outcome::Fail("timeout".into())));
    browser.script_clicks(
        "#retry",
        [Outcome::Fail("detached node".into()), Outcome::Found],
    );
    let brain = Brain::new(ScriptedModel::replying(&[
        r##"{"action": "click", "selector": "#retry"}"##,
    ]));

    let records = run_plan(
        &browser,
        &brain,
        dir.path(),
        json!([{"action": "click", "selector": "#go"}]),
    )
    .await;

    assert_eq!(records.len(), 2);
    assert!(records[1].is_recovery());
    assert_eq!(
        records[1].result().error_message(),
        Some("execute_action_failed:browser error: detached node")
    );
    assert_eq!(browser.count("click:#retry"), 1);
    assert_eq!(brain.model().prompts_containing(RECOVERY_MARKER), 1);
}
