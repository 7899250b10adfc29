//! Error types for the stepwise wizard engine.
//!
//! Configuration problems, bad navigation input and store failures all
//! surface through [`WizardError`]. None of them leave partially written
//! run state behind: the engine computes a whole transition before it
//! touches the store.

use thiserror::Error;

/// The main error type for wizard operations.
///
/// This enum uses `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking backward compatibility.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WizardError {
    /// The wizard configuration cannot run.
    #[error("Invalid configuration: {message} ({solution})")]
    InvalidConfig {
        /// What is wrong.
        message: String,
        /// How to fix it.
        solution: String,
    },

    /// An exchange addressed a step before the run was started.
    #[error("Wizard has not started: start it with an entry exchange")]
    NotStarted,

    /// An exchange addressed a step that is not reachable right now.
    #[error("\"{0}\" is not a valid step")]
    InvalidStep(String),

    /// A navigation directive named a step that cannot be jumped to.
    #[error("Invalid navigation: {0}")]
    InvalidNavigation(String),

    /// A journal write would leave a hole in a repeated step's records.
    #[error("Repetition {index} of step \"{step}\" skips records ({recorded} recorded)")]
    RepetitionGap {
        /// The step being written.
        step: String,
        /// The requested repetition index.
        index: usize,
        /// How many records the step already has.
        recorded: usize,
    },

    /// A step handler or lifecycle hook failed.
    #[error("Step handler error: {0}")]
    StepHandler(String),

    /// A handler was registered for a step the template does not declare.
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// Two handlers were registered for the same step.
    #[error("Duplicate step handler: {0}")]
    DuplicateHandler(String),

    /// Error occurred in the state store layer.
    #[error("State store error: {0}")]
    StateStore(String),

    /// A pause token could not be decoded.
    #[error("Invalid pause token: {0}")]
    InvalidPauseToken(String),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error (for SQLite state store).
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(String),
}

impl WizardError {
    /// Builds an [`WizardError::InvalidConfig`] from a message and a fix.
    pub fn invalid_config(message: impl Into<String>, solution: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            solution: solution.into(),
        }
    }

    /// Returns true for errors caused by how the wizard was configured.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::StepNotFound(_) | Self::DuplicateHandler(_)
        )
    }
}

/// A specialized `Result` type for wizard operations.
pub type Result<T> = std::result::Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_config() {
        let error = WizardError::invalid_config("\"steps\" not set", "Set \"steps\" on the builder");
        assert_eq!(
            error.to_string(),
            "Invalid configuration: \"steps\" not set (Set \"steps\" on the builder)"
        );
        assert!(error.is_config_error());
    }

    #[test]
    fn test_error_display_not_started() {
        let error = WizardError::NotStarted;
        assert!(error.to_string().starts_with("Wizard has not started"));
        assert!(!error.is_config_error());
    }

    #[test]
    fn test_error_display_invalid_step() {
        let error = WizardError::InvalidStep("too_far".to_string());
        assert_eq!(error.to_string(), "\"too_far\" is not a valid step");
    }

    #[test]
    fn test_error_display_repetition_gap() {
        let error = WizardError::RepetitionGap {
            step: "guests".to_string(),
            index: 4,
            recorded: 2,
        };
        assert_eq!(
            error.to_string(),
            "Repetition 4 of step \"guests\" skips records (2 recorded)"
        );
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: WizardError = json_error.into();
        assert!(error.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_duplicate_handler_is_config_error() {
        assert!(WizardError::DuplicateHandler("a".to_string()).is_config_error());
        assert!(WizardError::StepNotFound("a".to_string()).is_config_error());
        assert!(!WizardError::StateStore("down".to_string()).is_config_error());
    }
}
