//! Wizard configuration.
//!
//! [`WizardConfig`] holds every policy a run depends on. It derives serde
//! so it can be loaded from a file and so a paused wizard can carry it.

use crate::{Navigator, Result, StepTemplate, WizardError};
use serde::{Deserialize, Serialize};

/// Default prefix for persisted keys.
pub const DEFAULT_KEY_PREFIX: &str = "__wizard";

/// How a redirect location names the next step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepNaming {
    /// The step id alone.
    #[default]
    Plain,
    /// The step id, suffixed with `_{n}` from the second repetition on.
    Repetition,
}

impl StepNaming {
    /// Returns the location fragment for a repetition of `step`.
    ///
    /// ```
    /// use stepwise::StepNaming;
    ///
    /// assert_eq!(StepNaming::Repetition.location("guest", 0), "guest");
    /// assert_eq!(StepNaming::Repetition.location("guest", 1), "guest_2");
    /// assert_eq!(StepNaming::Plain.location("guest", 1), "guest");
    /// ```
    pub fn location(&self, step: &str, repetition_index: usize) -> String {
        match self {
            Self::Repetition if repetition_index > 0 => {
                format!("{}_{}", step, repetition_index + 1)
            }
            _ => step.to_string(),
        }
    }

    /// Resolves a location fragment back to a step id.
    ///
    /// Exact ids win. Under [`StepNaming::Repetition`] a `step_{n}` suffix
    /// is stripped when `step` is one of `known`.
    pub fn resolve<'a>(&self, location: &'a str, known: &[String]) -> Option<&'a str> {
        if known.iter().any(|s| s == location) {
            return Some(location);
        }
        if *self != Self::Repetition {
            return None;
        }

        let (step, suffix) = location.rsplit_once('_')?;
        let n: usize = suffix.parse().ok()?;
        (n >= 2 && known.iter().any(|s| s == step)).then_some(step)
    }
}

/// Configuration for a [`Wizard`](crate::Wizard).
///
/// Missing fields take their defaults when deserializing.
///
/// ```
/// use stepwise::WizardConfig;
///
/// let config: WizardConfig = serde_json::from_str(
///     r#"{"steps": ["account", "address"], "forward_only": true}"#,
/// ).unwrap();
/// assert!(config.auto_advance);
/// assert!(config.forward_only);
/// assert_eq!(config.key_prefix, "__wizard");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// The declared steps.
    pub steps: StepTemplate,
    /// Forward goes to the first unprocessed step.
    pub auto_advance: bool,
    /// Completed steps may not be revisited.
    pub forward_only: bool,
    /// Undecided branch groups fall back to their first non-disabled branch.
    pub default_branch: bool,
    /// Seconds allowed between viewing and submitting a step. 0 disables.
    pub step_timeout: u64,
    /// Prefix for every persisted key.
    pub key_prefix: String,
    /// Scopes persisted keys so several runs can share one store.
    pub run_id: Option<String>,
    /// Where to send the user when a step expires.
    pub expired_target: Option<String>,
    /// How redirect locations name steps.
    pub step_naming: StepNaming,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            steps: StepTemplate::new(),
            auto_advance: true,
            forward_only: false,
            default_branch: true,
            step_timeout: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            run_id: None,
            expired_target: None,
            step_naming: StepNaming::Plain,
        }
    }
}

impl WizardConfig {
    /// Checks that a run can start with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(WizardError::invalid_config(
                "\"steps\" not set",
                "Declare at least one step",
            ));
        }
        if self.step_timeout > 0 && self.expired_target.is_none() {
            return Err(WizardError::invalid_config(
                "\"step_timeout\" set without \"expired_target\"",
                "Set an expired target or disable the step timeout",
            ));
        }
        Ok(())
    }

    /// Returns the navigator for these policies.
    pub fn navigator(&self) -> Navigator {
        Navigator::new(self.auto_advance, self.forward_only)
    }

    /// Returns the persisted keys for this run.
    pub fn keys(&self) -> RunKeys {
        RunKeys::new(&self.key_prefix, self.run_id.as_deref())
    }

    /// Returns the run identifier used in logs and events.
    pub fn run_label(&self) -> &str {
        self.run_id.as_deref().unwrap_or(&self.key_prefix)
    }
}

/// The store keys one run is persisted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKeys {
    /// Branch directives.
    pub branch: String,
    /// The step data journal.
    pub data: String,
    /// The current repetition index.
    pub repetition_index: String,
    /// The active step list.
    pub steps: String,
    /// The step expiry deadline.
    pub step_timeout: String,
    /// The current step.
    pub current_step: String,
}

impl RunKeys {
    /// Builds keys as `{prefix}[.{run_id}].{name}`.
    pub fn new(prefix: &str, run_id: Option<&str>) -> Self {
        let base = match run_id {
            Some(run_id) => format!("{}.{}", prefix, run_id),
            None => prefix.to_string(),
        };
        let key = |name: &str| format!("{}.{}", base, name);

        Self {
            branch: key("branch"),
            data: key("data"),
            repetition_index: key("repetitionIndex"),
            steps: key("steps"),
            step_timeout: key("stepTimeout"),
            current_step: key("currentStep"),
        }
    }

    /// Returns every key.
    pub fn all(&self) -> [&str; 6] {
        [
            self.branch.as_str(),
            self.data.as_str(),
            self.repetition_index.as_str(),
            self.steps.as_str(),
            self.step_timeout.as_str(),
            self.current_step.as_str(),
        ]
    }
}
