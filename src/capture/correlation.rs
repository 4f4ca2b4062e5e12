//! Pending step storage keyed by correlation identifiers
//!
//! Start notifications push a pending [`StepRecord`] under a key derived from
//! the run identifier and its parent. End notifications pop the most recently
//! pushed record under the same key, so nested or repeated calls sharing a
//! key pair each completion with its nearest unmatched start.

use std::collections::HashMap;
use std::fmt;

use super::step::StepRecord;

/// Key under which agent tool steps are stacked
pub const TOOL_KEY: &str = "tool";

/// Composite key derived from a run identifier and its optional parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Concatenates `run_id` and `parent_run_id` when a parent is present.
    pub fn derive(run_id: &str, parent_run_id: Option<&str>) -> Self {
        match parent_run_id {
            Some(parent) => Self(format!("{}{}", run_id, parent)),
            None => Self(run_id.to_string()),
        }
    }

    pub fn tool() -> Self {
        Self(TOOL_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed LIFO stacks of pending steps
#[derive(Debug, Default)]
pub struct CorrelationStack {
    pending: HashMap<CorrelationKey, Vec<StepRecord>>,
}

impl CorrelationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a pending step under `key`
    pub fn push(&mut self, key: CorrelationKey, step: StepRecord) {
        self.pending.entry(key).or_default().push(step);
    }

    /// Pop the most recently pushed step under `key`
    pub fn pop(&mut self, key: &CorrelationKey) -> Option<StepRecord> {
        let stack = self.pending.get_mut(key)?;
        let step = stack.pop();
        if stack.is_empty() {
            self.pending.remove(key);
        }
        step
    }

    /// Number of pending steps under `key`
    pub fn depth(&self, key: &CorrelationKey) -> usize {
        self.pending.get(key).map_or(0, Vec::len)
    }

    /// Total number of pending steps across all keys
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
