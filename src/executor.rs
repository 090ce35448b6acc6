use std::time::Duration;
use tracing::{debug, info};

use crate::error::DriverError;
use crate::hands::BrowserDriver;
use crate::types::{
    Action, ActionFailure, ActionResult, ActionStatus, ActionStep, ClickTarget, ScrollDirection,
};

/// Longest pause a `wait` step can ask for.
pub const MAX_WAIT: Duration = Duration::from_secs(600);

/// Runs one [`ActionStep`] against the current page.
///
/// Exactly one attempt per call. Driver failures come back as error results;
/// nothing escapes as an `Err`.
pub struct ActionExecutor<'a, D> {
    driver: &'a D,
}

impl<'a, D: BrowserDriver> ActionExecutor<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self { driver }
    }

    pub async fn execute(&self, step: &ActionStep) -> ActionResult {
        debug!("Executing {:?}", step.action);
        match self.dispatch(&step.action).await {
            Ok(result) => result,
            Err(e) => ActionResult::failed(ActionFailure::Driver(e.to_string())),
        }
    }

    async fn dispatch(&self, action: &Action) -> Result<ActionResult, DriverError> {
        let result = match action {
            Action::Fill {
                selector: Some(selector),
                text,
            } => {
                if self.driver.fill(selector, text).await? {
                    ActionResult::status_with(ActionStatus::Filled, selector.as_str())
                } else {
                    ActionResult::status_with(ActionStatus::NoInputFound, selector.as_str())
                }
            }
            Action::Fill {
                selector: None,
                text,
            } => {
                if self.driver.fill_first_input(text).await? {
                    ActionResult::status(ActionStatus::FilledFirstInput)
                } else {
                    ActionResult::status(ActionStatus::NoInputFound)
                }
            }

            Action::Click {
                target: ClickTarget::Selector(selector),
            } => {
                if self.driver.click(selector).await? {
                    ActionResult::status_with(ActionStatus::Clicked, selector.as_str())
                } else {
                    ActionResult::status_with(ActionStatus::NoElement, selector.as_str())
                }
            }
            Action::Click {
                target: ClickTarget::Text(text),
            } => {
                if self.driver.click_text(text, true).await? {
                    ActionResult::status(ActionStatus::ClickedByText)
                } else if self.driver.click_text(text, false).await? {
                    ActionResult::status(ActionStatus::ClickedByTextFallback)
                } else {
                    ActionResult::status_with(ActionStatus::NoElementByText, text.as_str())
                }
            }
            Action::Click {
                target: ClickTarget::Missing,
            } => ActionResult::failed(ActionFailure::ClickWithoutTarget),

            Action::Press { key } => {
                self.driver.press(key).await?;
                ActionResult::status_with(ActionStatus::Pressed, key.as_str())
            }

            Action::Scroll {
                direction,
                distance,
            } => {
                let dy = match direction {
                    ScrollDirection::Down => *distance,
                    ScrollDirection::Up => distance.saturating_neg(),
                };
                self.driver.scroll_by(dy).await?;
                ActionResult::status_with(ActionStatus::Scrolled, dy.to_string())
            }

            Action::Wait { seconds } => {
                let pause = match Duration::try_from_secs_f64(*seconds) {
                    Ok(pause) => pause.min(MAX_WAIT),
                    Err(_) if *seconds > 0.0 => MAX_WAIT,
                    Err(_) => Duration::ZERO,
                };
                info!("Waiting {:?}", pause);
                tokio::time::sleep(pause).await;
                ActionResult::status(ActionStatus::Waited)
            }

            Action::Select {
                selector: Some(selector),
                value: Some(value),
            } => {
                self.driver.select_option(selector, value).await?;
                ActionResult::status_with(ActionStatus::Selected, value.as_str())
            }
            Action::Select { .. } => {
                ActionResult::failed(ActionFailure::SelectMissingSelectorOrValue)
            }

            Action::Hover {
                selector: Some(selector),
            } => {
                self.driver.hover(selector).await?;
                ActionResult::status_with(ActionStatus::Hovered, selector.as_str())
            }
            Action::Hover { selector: None } => {
                ActionResult::failed(ActionFailure::HoverWithoutSelector)
            }
        };

        Ok(result)
    }
}
