//! Ordered storage for completed steps
//!
//! Steps are appended in completion order and never modified afterwards.
//! An optional callback observes every appended step.

use std::fmt;
use std::sync::Arc;

use super::step::StepRecord;

/// Type alias for step callback functions
pub type StepCallback = Arc<dyn Fn(&StepRecord) + Send + Sync>;

/// Append-only sequence of completed steps
#[derive(Default)]
pub struct TraceBuffer {
    steps: Vec<StepRecord>,
    on_append_callback: Option<StepCallback>,
}

impl TraceBuffer {
    /// Create a new trace buffer
    ///
    /// # Arguments
    ///
    /// * `on_append_callback` - Optional callback called whenever a step is appended
    pub fn new(on_append_callback: Option<StepCallback>) -> Self {
        Self {
            steps: Vec::new(),
            on_append_callback,
        }
    }

    /// Append a completed step
    pub fn append(&mut self, step: StepRecord) {
        if let Some(callback) = &self.on_append_callback {
            callback(&step);
        }
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.steps.iter()
    }

    /// Printable summaries of every step, in completion order
    pub fn summaries(&self) -> Vec<String> {
        self.steps.iter().map(StepRecord::printable_summary).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }
}

impl fmt::Debug for TraceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceBuffer")
            .field("steps", &self.steps)
            .field("has_callback", &self.on_append_callback.is_some())
            .finish()
    }
}

impl<'a> IntoIterator for &'a TraceBuffer {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
