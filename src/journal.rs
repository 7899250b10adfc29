//! The step data journal.
//!
//! Every submitted step leaves a record in the [`Journal`]. A step visited
//! once holds a [`StepRecord::Single`]; recording a second repetition
//! promotes it to [`StepRecord::Repeated`], keeping the first record at
//! index 0.

use crate::{Result, WizardError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Data recorded for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRecord {
    /// One record for a step visited once.
    Single(JsonValue),
    /// Records for each repetition of a repeating step, indexed from 0.
    Repeated(Vec<JsonValue>),
}

impl StepRecord {
    /// Returns how many repetitions are recorded.
    pub fn count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Repeated(records) => records.len(),
        }
    }

    /// Returns the record for one repetition.
    pub fn get(&self, repetition_index: usize) -> Option<&JsonValue> {
        match self {
            Self::Single(data) if repetition_index == 0 => Some(data),
            Self::Single(_) => None,
            Self::Repeated(records) => records.get(repetition_index),
        }
    }

    /// Returns the record as plain JSON: the value itself, or an array of
    /// repetitions.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Single(data) => data.clone(),
            Self::Repeated(records) => JsonValue::Array(records.clone()),
        }
    }
}

/// Step data collected by a run, keyed by step id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journal {
    records: BTreeMap<String, StepRecord>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `data` for a repetition of `step`.
    ///
    /// Index 0 overwrites whatever single record exists, or the first
    /// element of a repeated one. Index 1 or more promotes a single record
    /// to index 0 of a sequence first. Writing past the end of a sequence
    /// is refused with [`WizardError::RepetitionGap`].
    pub fn record(&mut self, step: &str, repetition_index: usize, data: JsonValue) -> Result<()> {
        let existing = self.records.remove(step);

        let updated = match (existing, repetition_index) {
            (None, 0) | (Some(StepRecord::Single(_)), 0) => StepRecord::Single(data),
            (Some(StepRecord::Repeated(mut records)), 0) => {
                match records.first_mut() {
                    Some(first) => *first = data,
                    None => records.push(data),
                }
                StepRecord::Repeated(records)
            }
            (existing, index) => {
                let mut records = match existing {
                    Some(StepRecord::Single(first)) => vec![first],
                    Some(StepRecord::Repeated(records)) => records,
                    None => Vec::new(),
                };

                if index > records.len() {
                    let recorded = records.len();
                    // Put back what was there before refusing
                    if let Some(previous) = Self::restore(records) {
                        self.records.insert(step.to_string(), previous);
                    }
                    return Err(WizardError::RepetitionGap {
                        step: step.to_string(),
                        index,
                        recorded,
                    });
                }

                if index == records.len() {
                    records.push(data);
                } else {
                    records[index] = data;
                }
                StepRecord::Repeated(records)
            }
        };

        self.records.insert(step.to_string(), updated);
        Ok(())
    }

    fn restore(records: Vec<JsonValue>) -> Option<StepRecord> {
        match records.len() {
            0 => None,
            1 => records.into_iter().next().map(StepRecord::Single),
            _ => Some(StepRecord::Repeated(records)),
        }
    }

    /// Returns the record for `step`.
    pub fn get(&self, step: &str) -> Option<&StepRecord> {
        self.records.get(step)
    }

    /// Returns every record.
    pub fn records(&self) -> &BTreeMap<String, StepRecord> {
        &self.records
    }

    /// Returns true if `step` has any record.
    pub fn contains(&self, step: &str) -> bool {
        self.records.contains_key(step)
    }

    /// Returns how many repetitions of `step` are recorded.
    pub fn count(&self, step: &str) -> usize {
        self.records.get(step).map_or(0, StepRecord::count)
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the active steps without any record, in list order.
    pub fn unprocessed_steps<'a>(&self, active_steps: &'a [String]) -> Vec<&'a str> {
        active_steps
            .iter()
            .filter(|step| !self.contains(step))
            .map(String::as_str)
            .collect()
    }

    /// Returns the first unprocessed active step, or `None` when every
    /// active step has a record.
    pub fn expected_step<'a>(&self, active_steps: &'a [String]) -> Option<&'a str> {
        active_steps
            .iter()
            .find(|step| !self.contains(step))
            .map(String::as_str)
    }

    /// Returns the journal as plain JSON keyed by step.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.records
                .iter()
                .map(|(step, record)| (step.clone(), record.to_json()))
                .collect(),
        )
    }
}
