use chrono::{DateTime, Local};
use thiserror::Error;

use crate::classifier::ClassificationResult;

const FALLBACK_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationState {
    Idle,
    Loading,
    Success(ClassificationResult),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("A classification is already in progress")]
    InFlight,
}

// Idle -> Loading -> Success | Error. Only the current Ticket can leave Loading,
// so responses for an abandoned request are dropped.
#[derive(Debug)]
pub struct Presentation {
    state: PresentationState,
    generation: u64,
    resolved_at: Option<DateTime<Local>>,
}

impl Presentation {
    pub fn new() -> Self {
        Self {
            state: PresentationState::Idle,
            generation: 0,
            resolved_at: None,
        }
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, PresentationState::Loading)
    }

    /// When the current `Success` or `Error` was reached.
    pub fn resolved_at(&self) -> Option<DateTime<Local>> {
        self.resolved_at
    }

    pub fn submit(&mut self) -> Result<Ticket, SubmitError> {
        if self.is_loading() {
            log::warn!("Ignoring submit while a classification is in flight");
            return Err(SubmitError::InFlight);
        }
        self.generation += 1;
        self.state = PresentationState::Loading;
        self.resolved_at = None;
        Ok(Ticket(self.generation))
    }

    /// Applies the outcome of the request identified by `ticket`. Returns
    /// false when the request is no longer the one being waited on.
    pub fn resolve(&mut self, ticket: Ticket, outcome: Result<ClassificationResult, String>) -> bool {
        if ticket.0 != self.generation || !self.is_loading() {
            log::debug!("Discarding stale classification outcome {:?}", ticket);
            return false;
        }

        self.state = match outcome {
            Ok(result) => {
                log::info!("Classified as {} (biodegradable: {})", result.class, result.biodegradable);
                PresentationState::Success(result)
            }
            Err(message) => {
                log::error!("Classification failed: {}", message);
                PresentationState::Error(non_empty(message))
            }
        };
        self.resolved_at = Some(Local::now());
        true
    }

    /// Shows a failure that did not come from a submitted request, such as
    /// the camera refusing to open. Any outstanding ticket is invalidated.
    pub fn report_failure(&mut self, message: impl Into<String>) {
        let message = non_empty(message.into());
        log::error!("{}", message);
        self.generation += 1;
        self.state = PresentationState::Error(message);
        self.resolved_at = Some(Local::now());
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = PresentationState::Idle;
        self.resolved_at = None;
    }
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        message
    }
}

/// Display lines for a classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub class_line: String,
    pub biodegradable_line: String,
    /// `None` when the result carries no nutrient data
    pub nutrient_lines: Option<Vec<String>>,
}

impl ResultView {
    pub fn new(result: &ClassificationResult) -> Self {
        let nutrient_lines = result
            .nutrient_levels
            .as_ref()
            .filter(|levels| !levels.is_empty())
            .map(|levels| {
                levels
                    .iter()
                    .map(|(nutrient, level)| format!("{}: {:.2}", nutrient, level))
                    .collect()
            });

        Self {
            class_line: format!("Class: {}", result.class),
            biodegradable_line: format!(
                "Biodegradable: {}",
                if result.biodegradable { "Yes" } else { "No" }
            ),
            nutrient_lines,
        }
    }
}
