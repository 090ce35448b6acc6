//! Planner-driven browser automation: log in once, ask a language model for a
//! UI plan, execute it with retries and recovery, and record every step.

pub mod brain;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod executor;
pub mod extract;
pub mod hands;
pub mod normalize;
pub mod prompts;
pub mod recorder;
pub mod report;
pub mod runner;
pub mod session;
pub mod types;
pub mod urls;

pub use brain::{Brain, LanguageModel, OpenAiClient, PlannerResponse};
pub use config::Config;
pub use engine::{Agent, AgentOptions};
pub use error::{ConfigError, DriverError, LlmError};
pub use hands::{BrowserDriver, ChromeDriver, LaunchSettings, StorageState};
pub use report::RunReport;
pub use types::{Action, ActionResult, ActionStatus, ActionStep, StepRecord};
