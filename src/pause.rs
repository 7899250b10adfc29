//! Pausing and resuming runs.
//!
//! A [`PauseToken`] carries the wizard configuration together with every
//! persisted key of a run, so the run can be torn down and rebuilt later,
//! possibly by another process, at the same step.

use crate::{Result, StateStore, WizardConfig, WizardError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Token format version.
const PAUSE_FORMAT_VERSION: u32 = 1;

/// An opaque, serialized snapshot of a paused run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PauseToken(String);

impl PauseToken {
    /// Wraps a token string received from elsewhere.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the snapshot inside the token.
    pub fn decode(&self) -> Result<PausedWizard> {
        let paused: PausedWizard = serde_json::from_str(&self.0)
            .map_err(|e| WizardError::InvalidPauseToken(e.to_string()))?;
        if paused.version != PAUSE_FORMAT_VERSION {
            return Err(WizardError::InvalidPauseToken(format!(
                "unsupported version {}",
                paused.version
            )));
        }
        Ok(paused)
    }
}

impl fmt::Display for PauseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The decoded content of a [`PauseToken`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausedWizard {
    /// Token format version.
    pub version: u32,
    /// Configuration of the paused wizard.
    pub config: WizardConfig,
    /// Persisted entries by key, verbatim.
    pub entries: BTreeMap<String, JsonValue>,
}

impl PausedWizard {
    /// Reads every persisted key of the run configured by `config`.
    pub async fn capture<S: StateStore + ?Sized>(config: &WizardConfig, store: &S) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for key in config.keys().all() {
            if let Some(value) = store.get(key).await? {
                entries.insert(key.to_string(), value);
            }
        }

        Ok(Self {
            version: PAUSE_FORMAT_VERSION,
            config: config.clone(),
            entries,
        })
    }

    /// Replaces the run's keys in `store` with the captured entries.
    pub async fn restore<S: StateStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        for key in self.config.keys().all() {
            store.remove(key).await?;
        }
        for (key, value) in &self.entries {
            store.set(key, value).await?;
        }
        Ok(())
    }

    /// Serializes the snapshot into a token.
    pub fn encode(&self) -> Result<PauseToken> {
        Ok(PauseToken(serde_json::to_string(self)?))
    }
}
