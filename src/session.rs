//! Reaching an authenticated browsing context.
//!
//! ```text
//! NoSession ──file──▶ CookieCheck ──probe ok──▶ Authenticated
//!     │                    │ probe failed (file deleted)
//!     └────no file─────────┴──▶ ManualLoginPending ──probe ok──▶ Authenticated
//!                                        └──deadline──▶ LoginTimedOut
//! ```

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::brain::{Brain, LanguageModel};
use crate::dom;
use crate::hands::{BrowserDriver, StorageState};
use crate::prompts::base_url_prompt;
use crate::types::DEFAULT_START_URL;
use crate::urls::login_url;

const SESSION_COOKIE_HINTS: &[&str] = &["session", "auth", "token", "jwt", "sid"];
const LOGIN_PAGE_PHRASES: &[&str] = &["sign in", "login", "password", "create account"];

/// Deadline used when the configured login timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    CookieCheck,
    ManualLoginPending,
    Authenticated,
    LoginTimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::LoginTimedOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: SessionState,
    pub cookies: Vec<Value>,
    pub base_url: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::NoSession,
            cookies: Vec::new(),
            base_url: None,
        }
    }
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoginTimings {
    /// Pause after navigating before the first probe.
    pub settle: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for LoginTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Best-effort login detection: a session-like cookie name, or a page that
/// mentions none of the usual login phrases. Either signal is enough. Expect
/// false positives and negatives on unfamiliar sites.
pub fn looks_authenticated<'c>(
    cookie_names: impl IntoIterator<Item = &'c str>,
    page: Option<&str>,
) -> bool {
    let cookie_signal = cookie_names.into_iter().any(|name| {
        let name = name.to_lowercase();
        SESSION_COOKIE_HINTS.iter().any(|hint| name.contains(hint))
    });
    if cookie_signal {
        return true;
    }

    match page {
        Some(page) => {
            let page = page.to_lowercase();
            !LOGIN_PAGE_PHRASES.iter().any(|phrase| page.contains(phrase))
        }
        None => false,
    }
}

/// Sole owner of the [`Session`]; drives it to a terminal state.
pub struct SessionManager<'a, D, L> {
    driver: &'a D,
    brain: &'a Brain<L>,
    session_file: PathBuf,
    timings: LoginTimings,
    session: Session,
}

impl<'a, D: BrowserDriver, L: LanguageModel> SessionManager<'a, D, L> {
    pub fn new(
        driver: &'a D,
        brain: &'a Brain<L>,
        session_file: impl Into<PathBuf>,
        timings: LoginTimings,
    ) -> Self {
        Self {
            driver,
            brain,
            session_file: session_file.into(),
            timings,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn transition(&mut self, next: SessionState) {
        info!("Session {:?} -> {:?}", self.session.state, next);
        self.session.state = next;
    }

    /// Run the state machine to `Authenticated` or `LoginTimedOut`.
    pub async fn establish(mut self, task: &str, start_url: &str) -> Session {
        if self.session_file.exists() {
            self.transition(SessionState::CookieCheck);
            if self.replay_cookies(start_url).await {
                self.authenticated().await;
                return self.session;
            }
        } else {
            info!("No saved session at {}", self.session_file.display());
        }

        self.transition(SessionState::ManualLoginPending);
        if self.manual_login(task).await {
            self.authenticated().await;
        } else {
            self.transition(SessionState::LoginTimedOut);
        }
        self.session
    }

    async fn authenticated(&mut self) {
        self.session.cookies = self.driver.cookies().await.unwrap_or_default();
        self.transition(SessionState::Authenticated);
    }

    /// Replays the saved cookies and probes. A file that does not lead to a
    /// logged-in page is stale and gets deleted.
    async fn replay_cookies(&mut self, start_url: &str) -> bool {
        info!("Existing cookies found, injecting");
        match std::fs::read_to_string(&self.session_file)
            .map_err(|e| e.to_string())
            .and_then(|text| StorageState::from_json(&text).map_err(|e| e.to_string()))
        {
            Ok(state) => match self.driver.restore(&state).await {
                Ok(n) => info!("Injected {} cookies into session", n),
                Err(e) => warn!("Failed to preload cookies: {}", e),
            },
            Err(e) => warn!("Unreadable session file {}: {}", self.session_file.display(), e),
        }

        if let Err(e) = self.driver.navigate(start_url).await {
            warn!("Navigation to {} failed: {}", start_url, e);
        }
        tokio::time::sleep(self.timings.settle).await;

        if self.probe().await {
            info!("Logged in automatically using cookies");
            return true;
        }

        warn!("Cookies invalid or expired, removing and falling back to manual login");
        if let Err(e) = std::fs::remove_file(&self.session_file) {
            warn!("Could not remove {}: {}", self.session_file.display(), e);
        }
        false
    }

    async fn manual_login(&mut self, task: &str) -> bool {
        info!("Asking planner for the task's base website");
        let base = self
            .brain
            .plan(&base_url_prompt(task))
            .await
            .url()
            .unwrap_or_else(|| {
                warn!("Planner gave no usable base URL, defaulting to {}", DEFAULT_START_URL);
                DEFAULT_START_URL.to_string()
            });
        self.session.base_url = Some(base.clone());

        let login = login_url(&base);
        info!("Navigating to login page: {}", login);
        if let Err(e) = self.driver.navigate(&login).await {
            warn!("Navigation to {} failed: {}", login, e);
        }
        self.show_banner().await;

        let now = Instant::now();
        let deadline = now
            .checked_add(self.timings.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        loop {
            if self.probe().await {
                info!("Login detected, saving cookies and resuming");
                self.remove_banner().await;
                self.persist().await;
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.timings.poll_interval.min(deadline - now)).await;
        }

        warn!(
            "Manual login not completed in {}s",
            self.timings.timeout.as_secs()
        );
        self.remove_banner().await;
        false
    }

    pub async fn probe(&self) -> bool {
        let cookies = self.driver.cookies().await.unwrap_or_default();
        let page = self.driver.content().await.ok();
        let names = cookies
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str));
        looks_authenticated(names, page.as_deref())
    }

    async fn show_banner(&self) {
        let script = dom::manual_login_banner_js(self.timings.timeout.as_secs());
        if let Err(e) = self.driver.evaluate(&script).await {
            warn!("Could not show manual login prompt: {}", e);
        }
    }

    async fn remove_banner(&self) {
        if let Err(e) = self.driver.evaluate(&dom::remove_banner_js()).await {
            warn!("Could not remove manual login prompt: {}", e);
        }
    }

    /// Save storage state for the next run. Failure is not fatal.
    async fn persist(&self) {
        let state = match self.driver.storage_state().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to read storage state: {}", e);
                return;
            }
        };

        if let Some(parent) = self.session_file.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create {}: {}", parent.display(), e);
            }
        }
        let written = serde_json::to_string_pretty(&state)
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(&self.session_file, text).map_err(|e| e.to_string()));
        match written {
            Ok(()) => info!("Saved cookies to {}", self.session_file.display()),
            Err(e) => warn!("Failed to save cookies: {}", e),
        }
    }
}
