//! The navigation state machine.
//!
//! After a step has been submitted and journaled, [`Navigator::next_position`]
//! decides where the run goes: forward, back, into another repetition of the
//! same step, or to a named step. `None` means the run is finished.

use crate::{Journal, Result, WizardError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a step handler wants the run to go after a submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirective {
    /// Advance. The target depends on the auto-advance policy.
    #[default]
    Forward,
    /// Step back one repetition, or to the previous step.
    Backward,
    /// Stay on the current step as a new repetition.
    Repeat,
    /// Jump to a named step at or before the expected step.
    Goto(String),
}

impl NavigationDirective {
    /// Creates a jump to `step`.
    pub fn goto(step: impl Into<String>) -> Self {
        Self::Goto(step.into())
    }
}

/// A step together with the repetition being worked on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The step id.
    pub step: String,
    /// Zero-based repetition of the step.
    pub repetition_index: usize,
}

impl Position {
    /// Creates a position.
    pub fn new(step: impl Into<String>, repetition_index: usize) -> Self {
        Self {
            step: step.into(),
            repetition_index,
        }
    }
}

/// Applies the navigation policies of a wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    /// Forward goes to the first unprocessed step rather than the next one.
    pub auto_advance: bool,
    /// Completed steps may not be revisited.
    pub forward_only: bool,
}

impl Navigator {
    /// Creates a navigator with the given policies.
    pub fn new(auto_advance: bool, forward_only: bool) -> Self {
        Self {
            auto_advance,
            forward_only,
        }
    }

    /// Returns true if an exchange may address `step`.
    ///
    /// The first active step is always addressable, as is every step once
    /// nothing is left unprocessed. Otherwise a step must sit at or before
    /// the expected step, or be exactly the expected step when the wizard is
    /// forward only.
    pub fn is_valid_step(&self, step: &str, active_steps: &[String], journal: &Journal) -> bool {
        let Some(index) = position_of(active_steps, step) else {
            return false;
        };
        if index == 0 {
            return true;
        }

        match journal
            .expected_step(active_steps)
            .and_then(|expected| position_of(active_steps, expected))
        {
            None => true,
            Some(expected) if self.forward_only => index == expected,
            Some(expected) => index <= expected,
        }
    }

    /// Computes the position that follows `current`.
    ///
    /// `journal` must already hold the record just submitted for `current`.
    /// Returns `Ok(None)` when the run has nothing left to do.
    ///
    /// # Errors
    ///
    /// [`WizardError::InvalidNavigation`] if a jump names a step that is not
    /// active or lies beyond the expected step.
    pub fn next_position(
        &self,
        current: &Position,
        directive: &NavigationDirective,
        active_steps: &[String],
        journal: &Journal,
    ) -> Result<Option<Position>> {
        let directive = match directive {
            NavigationDirective::Backward | NavigationDirective::Goto(_) if self.forward_only => {
                debug!(?directive, "forward-only wizard, moving forward instead");
                &NavigationDirective::Forward
            }
            other => other,
        };

        match directive {
            NavigationDirective::Goto(target) => {
                self.goto(target, active_steps, journal).map(Some)
            }
            NavigationDirective::Backward => {
                Ok(Some(self.backward(current, active_steps, journal)))
            }
            NavigationDirective::Repeat => Ok(Some(Position::new(
                current.step.clone(),
                current.repetition_index + 1,
            ))),
            NavigationDirective::Forward => Ok(self.forward(current, active_steps, journal)),
        }
    }

    fn goto(&self, target: &str, active_steps: &[String], journal: &Journal) -> Result<Position> {
        let Some(index) = position_of(active_steps, target) else {
            return Err(WizardError::InvalidNavigation(format!(
                "\"{}\" is not an active step",
                target
            )));
        };

        if let Some(expected) = journal.expected_step(active_steps) {
            let expected_index = position_of(active_steps, expected).unwrap_or(index);
            if index > expected_index {
                return Err(WizardError::InvalidNavigation(format!(
                    "\"{}\" comes after the expected step \"{}\"",
                    target, expected
                )));
            }
        }

        Ok(Position::new(target, journal.count(target)))
    }

    fn backward(&self, current: &Position, active_steps: &[String], journal: &Journal) -> Position {
        if current.repetition_index > 0 {
            return Position::new(current.step.clone(), current.repetition_index - 1);
        }

        let previous = position_of(active_steps, &current.step)
            .map(|index| index.saturating_sub(1))
            .and_then(|index| active_steps.get(index));

        match previous {
            Some(step) => Position::new(step.clone(), journal.count(step).saturating_sub(1)),
            // The current step left the active list; stay put
            None => Position::new(current.step.clone(), 0),
        }
    }

    fn forward(
        &self,
        current: &Position,
        active_steps: &[String],
        journal: &Journal,
    ) -> Option<Position> {
        if !self.auto_advance {
            if let Some(index) = position_of(active_steps, &current.step) {
                return active_steps
                    .get(index + 1)
                    .map(|next| Position::new(next.clone(), journal.count(next)));
            }
        }

        journal
            .expected_step(active_steps)
            .map(|expected| Position::new(expected, 0))
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(true, false)
    }
}

fn position_of(active_steps: &[String], step: &str) -> Option<usize> {
    active_steps.iter().position(|s| s == step)
}
