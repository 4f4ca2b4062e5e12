//! Suspension gate for agent decision windows
//!
//! While an agent chooses its next action, the orchestration framework may
//! emit notifications for its internal model and tool calls. The gate is
//! engaged for that window so none of them reach the trace.

/// Single flag pausing correlation activity. Not reentrant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionGate {
    engaged: bool,
}

impl SuspensionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if correlation activity is currently suspended
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn engage(&mut self) {
        self.engaged = true;
    }

    pub fn disengage(&mut self) {
        self.engaged = false;
    }
}
