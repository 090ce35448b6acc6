#![allow(dead_code)]

use agentic_rpa::error::{DriverError, LlmError, Result};
use agentic_rpa::{BrowserDriver, LanguageModel, StorageState};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

pub const LOGIN_PAGE: &str = "<form><h1>Sign in</h1><input type=password></form>";
pub const APP_PAGE: &str = "<main><h1>Projects</h1><button id=submit>Create</button></main>";

/// Scripted outcome of one driver call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Found,
    Missing,
    Fail(String),
}

#[derive(Default)]
pub struct FakeState {
    pub url: String,
    pub page: String,
    pub cookies: Vec<Value>,
    /// Selectors that exist on the page.
    pub elements: HashSet<String>,
    /// Visible texts, for clicking by text.
    pub texts: Vec<String>,
    /// Per-selector click outcomes, consumed in order before `elements` is consulted.
    pub click_script: HashMap<String, VecDeque<Outcome>>,
    /// After this many cookie reads a session cookie appears (manual login).
    pub login_after_cookie_reads: Option<usize>,
    pub cookie_reads: usize,
    /// Reading the page fails while set.
    pub content_fails: bool,
    pub calls: Vec<String>,
    pub scripts: Vec<String>,
}

/// In-memory page that records every call made against it.
#[derive(Default)]
pub struct FakeBrowser {
    pub state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn on_page(page: &str) -> Self {
        let browser = Self::default();
        browser.with(|s| s.page = page.to_string());
        browser
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_element(&self, selector: &str) {
        self.with(|s| s.elements.insert(selector.to_string()));
    }

    pub fn script_clicks(&self, selector: &str, outcomes: impl IntoIterator<Item = Outcome>) {
        self.with(|s| {
            s.click_script
                .entry(selector.to_string())
                .or_default()
                .extend(outcomes)
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn banner_shown(&self) -> bool {
        self.with(|s| s.scripts.iter().any(|js| js.contains("createElement")))
    }

    fn record(&self, call: String) {
        self.with(|s| s.calls.push(call));
    }

    fn exists(&self, selector: &str) -> bool {
        self.with(|s| s.elements.contains(selector))
    }
}

fn session_cookie() -> Value {
    json!({"name": "session_id", "value": "abc", "domain": "app.test"})
}

#[async_trait(?Send)]
impl BrowserDriver for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate:{url}"));
        self.with(|s| s.url = url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.with(|s| s.url.clone()))
    }

    async fn content(&self) -> Result<String> {
        self.record("content".into());
        self.with(|s| {
            if s.content_fails {
                Err(DriverError::Browser("page crashed".into()))
            } else {
                Ok(s.page.clone())
            }
        })
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        self.record(format!("click:{selector}"));
        let scripted = self.with(|s| {
            s.click_script
                .get_mut(selector)
                .and_then(VecDeque::pop_front)
        });
        match scripted {
            Some(Outcome::Found) => Ok(true),
            Some(Outcome::Missing) => Ok(false),
            Some(Outcome::Fail(msg)) => Err(DriverError::Browser(msg)),
            None => Ok(self.exists(selector)),
        }
    }

    async fn click_text(&self, text: &str, exact: bool) -> Result<bool> {
        self.record(format!("click_text:{text}:{exact}"));
        Ok(self.with(|s| {
            s.texts.iter().any(|t| {
                if exact {
                    t.trim() == text.trim()
                } else {
                    t.to_lowercase().contains(&text.to_lowercase())
                }
            })
        }))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<bool> {
        self.record(format!("fill:{selector}={text}"));
        Ok(self.exists(selector))
    }

    async fn fill_first_input(&self, text: &str) -> Result<bool> {
        self.record(format!("fill_first_input={text}"));
        Ok(self.with(|s| s.elements.iter().any(|e| e.starts_with("input"))))
    }

    async fn press(&self, key: &str) -> Result<()> {
        self.record(format!("press:{key}"));
        Ok(())
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.record(format!("scroll:{dy}"));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.record(format!("select:{selector}={value}"));
        if self.exists(selector) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.record(format!("hover:{selector}"));
        if self.exists(selector) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.record("evaluate".into());
        self.with(|s| s.scripts.push(script.to_string()));
        Ok(Value::Null)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.record(format!("screenshot:{}", path.display()));
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Value>> {
        Ok(self.with(|s| {
            s.cookie_reads += 1;
            let due = s
                .login_after_cookie_reads
                .is_some_and(|after| s.cookie_reads > after);
            if due && s.cookies.is_empty() {
                s.cookies.push(session_cookie());
                s.page = APP_PAGE.to_string();
            }
            s.cookies.clone()
        }))
    }

    async fn restore(&self, state: &StorageState) -> Result<usize> {
        self.record("restore".into());
        self.with(|s| {
            s.cookies.extend(state.cookies.iter().cloned());
            // a valid session cookie takes us past the login wall
            if state.cookie_names().any(|n| n.contains("session")) {
                s.page = APP_PAGE.to_string();
            }
        });
        Ok(state.cookies.len())
    }
}

/// Language model that answers from a queue and remembers what it was asked.
/// An exhausted queue answers with a non-transient error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<std::result::Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = std::result::Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::default(),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }
}

#[async_trait(?Send)]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

pub const RECOVERY_MARKER: &str = "Did the last action make progress?";
pub const PLAN_MARKER: &str = "browser automation planner";
pub const BASE_URL_MARKER: &str = "base website URL";

pub fn write_session_file(dir: &Path) {
    let state = json!({"cookies": [session_cookie()], "origins": []});
    std::fs::write(dir.join("cookies.json"), state.to_string()).unwrap();
}
