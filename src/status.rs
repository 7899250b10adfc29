//! Run status reporting.
//!
//! This module provides [`RunStatus`] for inspecting where a wizard run
//! stands: which steps are active, what has been recorded, and which step
//! the run is waiting on.

use std::fmt;

use crate::WizardRunState;
use chrono::{DateTime, Utc};

/// The phase a run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    /// Nothing persisted yet.
    NotStarted,
    /// Waiting for a step to be viewed or submitted.
    AwaitingStepInput,
    /// A submit is being processed.
    ///
    /// Transient: it only exists while an exchange is in flight, so it is
    /// never persisted and [`WizardPhase::of`] never returns it. The engine
    /// reports it in the `exchange` span's logs.
    Advancing,
    /// The step deadline has passed.
    Expired,
    /// The run has no step left to show.
    Finished,
}

impl WizardPhase {
    /// Derives the phase of persisted state at `now`.
    pub fn of(state: Option<&WizardRunState>, now: DateTime<Utc>) -> Self {
        match state {
            None => Self::NotStarted,
            Some(state) if state.has_expired(now) => Self::Expired,
            Some(state) if state.current_step.is_none() => Self::Finished,
            Some(_) => Self::AwaitingStepInput,
        }
    }
}

impl fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::AwaitingStepInput => "awaiting input",
            Self::Advancing => "advancing",
            Self::Expired => "expired",
            Self::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Status entry for a single active step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatusEntry {
    /// The step name.
    pub name: String,
    /// How many repetitions are recorded.
    pub records: usize,
    /// True for the step the run is on.
    pub is_current: bool,
}

impl StepStatusEntry {
    /// Returns true if the step has a record.
    pub fn is_processed(&self) -> bool {
        self.records > 0
    }

    /// Returns a status indicator character.
    pub fn status_char(&self) -> char {
        match (self.is_current, self.is_processed()) {
            (true, _) => '👉',
            (false, true) => '✅',
            (false, false) => '⏳',
        }
    }
}

/// A snapshot of one run.
#[derive(Debug, Clone)]
pub struct RunStatus {
    /// The run identifier.
    pub run_id: String,
    /// The phase the run is in.
    pub phase: WizardPhase,
    /// The step the run is on.
    pub current_step: Option<String>,
    /// Repetition of the current step.
    pub repetition_index: usize,
    /// When the current step expires, if armed.
    pub step_deadline: Option<DateTime<Utc>>,
    /// Active steps in order.
    pub steps: Vec<StepStatusEntry>,
}

impl RunStatus {
    /// Builds the status of persisted state at `now`.
    pub fn from_state(
        run_id: impl Into<String>,
        state: Option<&WizardRunState>,
        now: DateTime<Utc>,
    ) -> Self {
        let phase = WizardPhase::of(state, now);
        let run_id = run_id.into();

        let Some(state) = state else {
            return Self {
                run_id,
                phase,
                current_step: None,
                repetition_index: 0,
                step_deadline: None,
                steps: Vec::new(),
            };
        };

        let steps = state
            .active_steps
            .iter()
            .map(|name| StepStatusEntry {
                name: name.clone(),
                records: state.journal.count(name),
                is_current: state.current_step.as_deref() == Some(name.as_str()),
            })
            .collect();

        Self {
            run_id,
            phase,
            current_step: state.current_step.clone(),
            repetition_index: state.repetition_index,
            step_deadline: state.step_deadline,
            steps,
        }
    }

    /// Returns true once every active step has a record.
    pub fn is_complete(&self) -> bool {
        self.phase != WizardPhase::NotStarted && self.steps.iter().all(StepStatusEntry::is_processed)
    }

    /// Returns the active steps without a record.
    pub fn pending_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !s.is_processed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Returns the overall progress as a percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.steps.is_empty() {
            return if self.phase == WizardPhase::NotStarted {
                0.0
            } else {
                100.0
            };
        }

        let processed = self.steps.iter().filter(|s| s.is_processed()).count();
        (processed as f32 / self.steps.len() as f32) * 100.0
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Wizard status for run \"{}\":", self.run_id)?;
        writeln!(f)?;

        for step in &self.steps {
            write!(f, "  {} {:<15}", step.status_char(), step.name)?;
            if step.records > 1 {
                write!(f, "  ({} repetitions)", step.records)?;
            }
            if step.is_current && self.repetition_index > 0 {
                write!(f, "  [repetition {}]", self.repetition_index)?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "Progress: {:.0}%", self.progress_percent())?;
        write!(f, "Status: {}", self.phase)?;
        if let Some(deadline) = self.step_deadline {
            write!(f, " (step expires {})", deadline.format("%Y-%m-%d %H:%M:%S"))?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BranchDirectives, Position};
    use serde_json::json;

    fn state(steps: &[&str]) -> WizardRunState {
        WizardRunState::new(
            steps.iter().map(|s| s.to_string()).collect(),
            BranchDirectives::new(),
        )
    }

    #[test]
    fn test_not_started() {
        let status = RunStatus::from_state("run", None, Utc::now());
        assert_eq!(status.phase, WizardPhase::NotStarted);
        assert!(!status.is_complete());
        assert_eq!(status.progress_percent(), 0.0);
    }

    #[test]
    fn test_partial_progress() {
        let mut state = state(&["a", "b", "c"]);
        state.journal.record("a", 0, json!({})).unwrap();
        state.move_to(Position::new("b", 0));

        let status = RunStatus::from_state("run", Some(&state), Utc::now());
        assert_eq!(status.phase, WizardPhase::AwaitingStepInput);
        assert_eq!(status.current_step.as_deref(), Some("b"));
        assert_eq!(status.pending_steps(), vec!["b", "c"]);
        assert!((status.progress_percent() - 33.33).abs() < 1.0);
        assert_eq!(status.steps[1].status_char(), '👉');
    }

    #[test]
    fn test_expired_phase() {
        let mut state = state(&["a"]);
        let now = Utc::now();
        state.arm_deadline(now, 1);
        let later = now + chrono::Duration::seconds(5);
        assert_eq!(WizardPhase::of(Some(&state), later), WizardPhase::Expired);
    }

    #[test]
    fn test_complete() {
        let mut state = state(&["a", "b"]);
        state.journal.record("a", 0, json!({})).unwrap();
        state.journal.record("b", 0, json!({})).unwrap();
        let status = RunStatus::from_state("run", Some(&state), Utc::now());
        assert!(status.is_complete());
        assert_eq!(status.progress_percent(), 100.0);
    }

    #[test]
    fn test_display() {
        let mut state = state(&["account", "guests"]);
        state.journal.record("account", 0, json!({})).unwrap();
        state.journal.record("guests", 0, json!({})).unwrap();
        state.journal.record("guests", 1, json!({})).unwrap();
        state.move_to(Position::new("guests", 2));

        let display = format!("{}", RunStatus::from_state("signup", Some(&state), Utc::now()));
        assert!(display.contains("signup"));
        assert!(display.contains("account"));
        assert!(display.contains("2 repetitions"));
        assert!(display.contains("[repetition 2]"));
        assert!(display.contains("awaiting input"));
    }

    #[test]
    fn test_persisted_state_is_never_advancing() {
        let mut state = state(&["a", "b"]);
        let now = Utc::now();
        assert_eq!(WizardPhase::of(Some(&state), now), WizardPhase::AwaitingStepInput);

        state.journal.record("a", 0, json!({})).unwrap();
        state.arm_deadline(now, 60);
        assert_ne!(WizardPhase::of(Some(&state), now), WizardPhase::Advancing);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(WizardPhase::Advancing.to_string(), "advancing");
        assert_eq!(WizardPhase::NotStarted.to_string(), "not started");
    }
}
