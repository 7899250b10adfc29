//! Typed access to a run's persisted state.
//!
//! [`WizardRunState`] is loaded from the store at the start of an exchange,
//! changed in memory, and written back in one go once the exchange knows
//! where the run is heading.

use crate::{BranchDirectives, Journal, Position, Result, RunKeys, StateStore};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Everything persisted for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardRunState {
    /// The step the run is on.
    pub current_step: Option<String>,
    /// Steps selected by the template and branch directives.
    pub active_steps: Vec<String>,
    /// Branch directives set by step handlers.
    pub branches: BranchDirectives,
    /// Data recorded so far.
    pub journal: Journal,
    /// Repetition of the current step being worked on.
    pub repetition_index: usize,
    /// Submits after this instant are routed to expiry.
    pub step_deadline: Option<DateTime<Utc>>,
}

impl WizardRunState {
    /// Creates state for a run that is just starting.
    pub fn new(active_steps: Vec<String>, branches: BranchDirectives) -> Self {
        Self {
            current_step: active_steps.first().cloned(),
            active_steps,
            branches,
            ..Default::default()
        }
    }

    /// Returns true if a run has been started in `store`.
    pub async fn exists<S: StateStore + ?Sized>(store: &S, keys: &RunKeys) -> Result<bool> {
        store.has(&keys.data).await
    }

    /// Loads the run persisted under `keys`, if one has started.
    pub async fn load<S: StateStore + ?Sized>(store: &S, keys: &RunKeys) -> Result<Option<Self>> {
        let Some(journal) = store.get(&keys.data).await? else {
            return Ok(None);
        };

        let step_deadline = match store.get(&keys.step_timeout).await? {
            Some(JsonValue::String(raw)) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        crate::WizardError::StateStore(format!("bad step deadline: {}", e))
                    })?
                    .with_timezone(&Utc),
            ),
            _ => None,
        };

        Ok(Some(Self {
            current_step: decode_or_default(store, &keys.current_step).await?,
            active_steps: decode_or_default(store, &keys.steps).await?,
            branches: decode_or_default(store, &keys.branch).await?,
            journal: serde_json::from_value(journal)?,
            repetition_index: decode_or_default(store, &keys.repetition_index).await?,
            step_deadline,
        }))
    }

    /// Writes every key of the run.
    pub async fn save<S: StateStore + ?Sized>(&self, store: &mut S, keys: &RunKeys) -> Result<()> {
        store
            .set(&keys.branch, &serde_json::to_value(&self.branches)?)
            .await?;
        store
            .set(&keys.data, &serde_json::to_value(&self.journal)?)
            .await?;
        store
            .set(&keys.repetition_index, &JsonValue::from(self.repetition_index))
            .await?;
        store
            .set(&keys.steps, &serde_json::to_value(&self.active_steps)?)
            .await?;

        match &self.current_step {
            Some(step) => store.set(&keys.current_step, &JsonValue::from(step.as_str())).await?,
            None => store.remove(&keys.current_step).await?,
        }
        match self.step_deadline {
            Some(deadline) => {
                store
                    .set(&keys.step_timeout, &JsonValue::from(deadline.to_rfc3339()))
                    .await?
            }
            None => store.remove(&keys.step_timeout).await?,
        }
        Ok(())
    }

    /// Removes every key of the run.
    pub async fn clear<S: StateStore + ?Sized>(store: &mut S, keys: &RunKeys) -> Result<()> {
        for key in keys.all() {
            store.remove(key).await?;
        }
        Ok(())
    }

    /// Returns the current position, if the run has a current step.
    pub fn position(&self) -> Option<Position> {
        self.current_step
            .as_ref()
            .map(|step| Position::new(step.clone(), self.repetition_index))
    }

    /// Moves the run to `position` and disarms the step deadline.
    pub fn move_to(&mut self, position: Position) {
        self.current_step = Some(position.step);
        self.repetition_index = position.repetition_index;
        self.step_deadline = None;
    }

    /// Points the run at another step without touching the deadline.
    ///
    /// Used when an exchange addresses a step other than the current one;
    /// the deadline armed by the last view still governs the submit.
    pub fn address(&mut self, step: impl Into<String>) {
        self.current_step = Some(step.into());
        self.repetition_index = 0;
    }

    /// Returns the first active step without a record.
    pub fn expected_step(&self) -> Option<&str> {
        self.journal.expected_step(&self.active_steps)
    }

    /// Arms the step deadline `seconds` from `now`.
    ///
    /// A timeout too large to represent leaves the deadline unarmed.
    pub fn arm_deadline(&mut self, now: DateTime<Utc>, seconds: u64) {
        self.step_deadline = i64::try_from(seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|timeout| now.checked_add_signed(timeout));
    }

    /// Returns true if the step deadline is armed and has passed.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.step_deadline.is_some_and(|deadline| now > deadline)
    }
}

async fn decode_or_default<S, T>(store: &S, key: &str) -> Result<T>
where
    S: StateStore + ?Sized,
    T: DeserializeOwned + Default,
{
    match store.get(key).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(T::default()),
    }
}
