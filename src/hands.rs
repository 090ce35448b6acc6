use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dom;
use crate::error::{DriverError, Result};

/// Cookies plus per-origin storage, as exported after a successful login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Value>,
    #[serde(default)]
    pub origins: Vec<Value>,
}

impl StorageState {
    /// Accepts either the full `{cookies, origins}` document or a bare cookie
    /// array.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OnDisk {
            Full(StorageState),
            Bare(Vec<Value>),
        }

        Ok(match serde_json::from_str::<OnDisk>(text)? {
            OnDisk::Full(state) => state,
            OnDisk::Bare(cookies) => StorageState {
                cookies,
                origins: Vec::new(),
            },
        })
    }

    pub fn cookie_names(&self) -> impl Iterator<Item = &str> {
        self.cookies
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
    }
}

/// Everything the engine needs from a browser page.
///
/// "Not found" is reported as `Ok(false)` where the caller treats it as a
/// status rather than a failure; genuine driver problems are `Err`. The engine
/// drives a single page from one task, so futures need not be `Send`.
#[async_trait(?Send)]
pub trait BrowserDriver {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    async fn content(&self) -> Result<String>;

    async fn click(&self, selector: &str) -> Result<bool>;
    async fn click_text(&self, text: &str, exact: bool) -> Result<bool>;
    async fn fill(&self, selector: &str, text: &str) -> Result<bool>;
    async fn fill_first_input(&self, text: &str) -> Result<bool>;
    async fn press(&self, key: &str) -> Result<()>;
    async fn scroll_by(&self, dy: i64) -> Result<()>;
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;
    async fn hover(&self, selector: &str) -> Result<()>;
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn screenshot(&self, path: &Path) -> Result<()>;
    async fn cookies(&self) -> Result<Vec<Value>>;
    async fn restore(&self, state: &StorageState) -> Result<usize>;
    async fn storage_state(&self) -> Result<StorageState> {
        Ok(StorageState {
            cookies: self.cookies().await?,
            origins: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LaunchSettings {
    pub headful: bool,
    pub window_size: Option<(u32, u32)>,
    pub chrome_path: Option<PathBuf>,
}

/// Chrome over CDP. Created once per run; every call runs the blocking
/// `headless_chrome` API on the blocking pool against a clone of the tab.
pub struct ChromeDriver {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub fn launch(settings: &LaunchSettings) -> anyhow::Result<Self> {
        let chrome_path = find_chrome(settings.chrome_path.as_deref());
        match &chrome_path {
            Some(p) => info!("Using Chrome at {}", p.display()),
            None => info!("No Chrome found in known locations, using driver default"),
        }

        let options = LaunchOptions {
            headless: !settings.headful,
            path: chrome_path,
            window_size: settings.window_size,
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                std::ffi::OsStr::new("--disable-infobars"),
                std::ffi::OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        info!("Starting Chrome (headless: {})", options.headless);
        let browser = Browser::new(options)
            .map_err(|e| anyhow::anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| DriverError::Browser(format!("browser task panicked: {}", e)))?
    }
}

fn eval(tab: &Tab, script: &str) -> Result<Value> {
    let result = tab
        .evaluate(script, false)
        .map_err(|e| DriverError::Script(format!("{:#}", e)))?;
    Ok(result.value.unwrap_or(Value::Null))
}

/// Whether `selector` matches anything; syntax errors surface as
/// [`DriverError::InvalidSelector`].
fn probe(tab: &Tab, selector: &str) -> Result<bool> {
    let verdict = eval(tab, &dom::probe_selector_js(selector))?;
    match verdict.as_str() {
        Some("found") => Ok(true),
        Some("missing") => Ok(false),
        Some(other) => Err(DriverError::InvalidSelector {
            selector: selector.to_string(),
            reason: other.trim_start_matches("invalid:").to_string(),
        }),
        None => Err(DriverError::Script(format!(
            "unexpected probe result for '{}': {}",
            selector, verdict
        ))),
    }
}

#[async_trait(?Send)]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            info!("Navigating to {}", url);
            tab.navigate_to(&url)?;
            if let Err(e) = tab.wait_until_navigated() {
                warn!("Navigation to {} did not settle: {:#}", url, e);
            }
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        self.with_tab(|tab| Ok(tab.get_url())).await
    }

    async fn content(&self) -> Result<String> {
        self.with_tab(|tab| Ok(tab.get_content()?)).await
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            if !probe(tab, &selector)? {
                return Ok(false);
            }
            tab.find_element(&selector)?.click()?;
            Ok(true)
        })
        .await
    }

    async fn click_text(&self, text: &str, exact: bool) -> Result<bool> {
        let script = dom::click_by_text_js(text, exact);
        self.with_tab(move |tab| Ok(eval(tab, &script)?.as_bool().unwrap_or(false)))
            .await
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<bool> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.with_tab(move |tab| {
            if !probe(tab, &selector)? {
                return Ok(false);
            }
            tab.find_element(&selector)?.click()?;
            eval(tab, &dom::clear_value_js(&selector))?;
            tab.type_str(&text)?;
            Ok(true)
        })
        .await
    }

    async fn fill_first_input(&self, text: &str) -> Result<bool> {
        const FIRST_INPUT: &str = "input, textarea";
        let text = text.to_string();
        self.with_tab(move |tab| {
            if !probe(tab, FIRST_INPUT)? {
                return Ok(false);
            }
            tab.find_element(FIRST_INPUT)?.click()?;
            eval(tab, &dom::clear_value_js(FIRST_INPUT))?;
            tab.type_str(&text)?;
            Ok(true)
        })
        .await
    }

    async fn press(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_tab(move |tab| {
            tab.press_key(&key)?;
            Ok(())
        })
        .await
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        let script = dom::scroll_by_js(dy);
        self.with_tab(move |tab| eval(tab, &script).map(|_| ())).await
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let selector = selector.to_string();
        let script = dom::select_option_js(&selector, value);
        self.with_tab(move |tab| {
            if !probe(tab, &selector)? {
                return Err(DriverError::ElementNotFound(selector));
            }
            eval(tab, &script)?;
            Ok(())
        })
        .await
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            if !probe(tab, &selector)? {
                return Err(DriverError::ElementNotFound(selector));
            }
            tab.find_element(&selector)?.move_mouse_over()?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let script = script.to_string();
        self.with_tab(move |tab| eval(tab, &script)).await
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.with_tab(move |tab| {
            let png =
                tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
            std::fs::write(&path, png)?;
            debug!("Screenshot written to {}", path.display());
            Ok(())
        })
        .await
    }

    async fn cookies(&self) -> Result<Vec<Value>> {
        self.with_tab(|tab| {
            let cookies = tab.get_cookies()?;
            Ok(cookies
                .iter()
                .map(serde_json::to_value)
                .collect::<serde_json::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn restore(&self, state: &StorageState) -> Result<usize> {
        let params: Vec<CookieParam> = state
            .cookies
            .iter()
            .filter_map(|c| match serde_json::from_value::<CookieParam>(c.clone()) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Skipping unreadable cookie {}: {}", c, e);
                    None
                }
            })
            .collect();
        let count = params.len();

        self.with_tab(move |tab| {
            tab.set_cookies(params)?;
            Ok(count)
        })
        .await
    }
}

/// Chrome binary to launch: the configured path if it exists, then the usual
/// install locations. `None` leaves discovery to `headless_chrome`.
pub fn find_chrome(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!("Configured chrome_path {} does not exist", path.display());
    }

    default_chrome_paths().into_iter().find(|p| p.exists())
}

fn default_chrome_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
        ]
    };

    // per-user install
    if cfg!(target_os = "windows") {
        if let Some(local) = dirs::data_local_dir() {
            paths.push(
                local
                    .join("Google")
                    .join("Chrome")
                    .join("Application")
                    .join("chrome.exe"),
            );
        }
    }

    paths
}
