//! Monitor loop state

use std::time::Duration;

use crate::config::MonitorConfig;

/// Where the loop currently is within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Querying the balance source
    #[default]
    Fetching,
    /// Validating the payload
    Parsing,
    /// Comparing the reading against the threshold
    Evaluating,
    /// Waiting for the next tick
    Sleeping,
}

/// Counters and settings owned by the monitor loop
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    consecutive_failures: u32,
    threshold: f64,
    max_consecutive_failures: u32,
    interval: Duration,
}

impl MonitorState {
    /// Fresh state with a zero failure streak
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: config.threshold,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            interval: config.interval(),
        }
    }

    /// Length of the current failure streak
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Alert threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Streak length that triggers a repeated-failure alert
    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }

    /// Time between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub(crate) fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub(crate) fn should_escalate(&self) -> bool {
        self.consecutive_failures >= self.max_consecutive_failures
    }
}
