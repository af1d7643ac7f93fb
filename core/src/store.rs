// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The snapshot store and the change detector that watches it.

use crate::{error::InvariantError, types::Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What [SnapshotStore::check_changed()] saw.
#[derive(Clone, Debug, PartialEq)]
pub enum Detection {
    /// The watched value is the one last acknowledged, or there's still
    /// nothing to acknowledge.
    Unchanged,
    /// The value differs from the last acknowledged one. The payload is the
    /// new value, or the previous one if the caller asked for it. It is `None`
    /// only when a previously acknowledged key has disappeared.
    Changed(Option<Value>),
}
impl Detection {
    #[allow(missing_docs)]
    pub fn is_changed(&self) -> bool {
        matches!(self, Detection::Changed(_))
    }

    /// The payload as a number, if there is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Detection::Changed(Some(value)) => value.as_f64(),
            _ => None,
        }
    }
}

/// Holds the latest derived values ("play data") and, per check-id, the last
/// value the change detector acknowledged ("check values").
///
/// The serialized form is the persisted state file: `{playData, chkValues}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStore {
    #[serde(rename = "playData", default)]
    values: HashMap<String, Value>,
    #[serde(rename = "chkValues", default)]
    acknowledged: HashMap<String, Value>,
}
impl SnapshotStore {
    /// Overwrites the value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the stored value, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the stored value, or `default` if there isn't one.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.values.get(key).cloned().unwrap_or_else(|| default.into())
    }

    #[allow(missing_docs)]
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Missing keys are false.
    pub fn get_flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    /// The last value acknowledged under `check_id`.
    pub fn acknowledged(&self, check_id: &str) -> Option<&Value> {
        self.acknowledged.get(check_id)
    }

    /// Compares the current value of `key` against the last value
    /// acknowledged under `check_id`, and acknowledges the current value if
    /// they differ.
    ///
    /// The first non-empty observation counts as a change. With `return_old`
    /// the payload is the pre-change value (or the current value on first
    /// observation, since there is no prior).
    ///
    /// Call this at most once per cycle per check-id; a second call in the
    /// same cycle reports [Detection::Unchanged] and the old value is gone.
    pub fn check_changed(
        &mut self,
        key: &str,
        check_id: &str,
        return_old: bool,
    ) -> Result<Detection, InvariantError> {
        if check_id.is_empty() {
            return Err(InvariantError {
                key: key.to_string(),
            });
        }

        let current = self.values.get(key).cloned();
        let previous = self.acknowledged.get(check_id).cloned();
        match (previous, current) {
            (Some(previous), Some(current)) if previous == current => Ok(Detection::Unchanged),
            (Some(previous), Some(current)) => {
                log::debug!("Updated check value {check_id}: {previous} -> {current} ({key})");
                self.acknowledged
                    .insert(check_id.to_string(), current.clone());
                Ok(Detection::Changed(Some(if return_old {
                    previous
                } else {
                    current
                })))
            }
            (Some(previous), None) => {
                log::debug!("Check value {check_id} lost its key {key}; was {previous}");
                self.acknowledged.remove(check_id);
                Ok(Detection::Changed(return_old.then_some(previous)))
            }
            (None, Some(current)) => {
                log::debug!("Creating check value {check_id}: {current} ({key})");
                self.acknowledged
                    .insert(check_id.to_string(), current.clone());
                Ok(Detection::Changed(Some(current)))
            }
            (None, None) => Ok(Detection::Unchanged),
        }
    }
}
