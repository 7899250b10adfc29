//! Wizard lifecycle events.
//!
//! This module provides [`WizardEvent`] for observing wizard runs. Events
//! are broadcast through a channel that can be subscribed to for
//! monitoring, logging, or analytics.

use crate::{BranchDirectives, Journal};

/// An event emitted while a wizard handles exchanges.
///
/// Events are observations only. Vetoing and response content go through
/// [`WizardHooks`](crate::WizardHooks).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum WizardEvent {
    /// A run started.
    WizardStarted {
        /// The run identifier.
        run_id: String,
        /// Active steps at start.
        steps: Vec<String>,
    },

    /// `before_wizard` vetoed a run.
    WizardVetoed {
        /// The run identifier.
        run_id: String,
    },

    /// A step was rendered.
    StepViewed {
        /// The run identifier.
        run_id: String,
        /// The step name.
        step: String,
        /// The repetition rendered.
        repetition_index: usize,
    },

    /// Data was journaled for a step.
    StepSubmitted {
        /// The run identifier.
        run_id: String,
        /// The step name.
        step: String,
        /// The repetition recorded.
        repetition_index: usize,
    },

    /// A handler changed branch directives and the active steps were rebuilt.
    BranchesChanged {
        /// The run identifier.
        run_id: String,
        /// Directives after the merge.
        branches: BranchDirectives,
        /// Rebuilt active steps.
        steps: Vec<String>,
    },

    /// Navigation moved the run to a step.
    StepEntered {
        /// The run identifier.
        run_id: String,
        /// The step name.
        step: String,
        /// The repetition entered.
        repetition_index: usize,
    },

    /// A submit arrived after the step deadline.
    StepExpired {
        /// The run identifier.
        run_id: String,
        /// The step name.
        step: String,
    },

    /// A handler ended the run early.
    WizardAborted {
        /// The run identifier.
        run_id: String,
        /// The step that aborted.
        step: String,
    },

    /// A run ended and its state was cleared.
    WizardCompleted {
        /// The run identifier.
        run_id: String,
        /// The journal as it stood at the end.
        journal: Journal,
    },

    /// A run was paused into a token.
    WizardPaused {
        /// The run identifier.
        run_id: String,
    },

    /// A run was restored from a token.
    WizardResumed {
        /// The run identifier.
        run_id: String,
        /// The step the run resumes on.
        step: Option<String>,
    },

    /// A run's state was cleared explicitly.
    WizardReset {
        /// The run identifier.
        run_id: String,
    },
}

impl WizardEvent {
    /// Returns the run ID for this event.
    pub fn run_id(&self) -> &str {
        match self {
            Self::WizardStarted { run_id, .. }
            | Self::WizardVetoed { run_id }
            | Self::StepViewed { run_id, .. }
            | Self::StepSubmitted { run_id, .. }
            | Self::BranchesChanged { run_id, .. }
            | Self::StepEntered { run_id, .. }
            | Self::StepExpired { run_id, .. }
            | Self::WizardAborted { run_id, .. }
            | Self::WizardCompleted { run_id, .. }
            | Self::WizardPaused { run_id }
            | Self::WizardResumed { run_id, .. }
            | Self::WizardReset { run_id } => run_id,
        }
    }

    /// Returns the step name for this event, if applicable.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepViewed { step, .. }
            | Self::StepSubmitted { step, .. }
            | Self::StepEntered { step, .. }
            | Self::StepExpired { step, .. }
            | Self::WizardAborted { step, .. } => Some(step),
            Self::WizardResumed { step, .. } => step.as_deref(),
            Self::WizardStarted { .. }
            | Self::WizardVetoed { .. }
            | Self::BranchesChanged { .. }
            | Self::WizardCompleted { .. }
            | Self::WizardPaused { .. }
            | Self::WizardReset { .. } => None,
        }
    }

    /// Returns true if the run ended with this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::WizardVetoed { .. } | Self::WizardCompleted { .. } | Self::WizardReset { .. }
        )
    }
}
