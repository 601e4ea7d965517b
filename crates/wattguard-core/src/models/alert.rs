//! Alert data models

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::reading::BalanceReading;

/// What an alert is about
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    /// The balance fell strictly below the threshold
    LowBalance {
        /// The reading that crossed the threshold
        reading: BalanceReading,
        /// Threshold in force when the reading was evaluated
        threshold: f64,
    },
    /// Several ticks in a row produced no usable reading
    RepeatedFailure {
        /// Length of the failure streak
        count: u32,
    },
}

/// An alert raised by the monitor loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    /// Unique identifier, for log correlation
    pub id: Uuid,

    /// What triggered the alert
    pub kind: AlertKind,

    /// When the alert was raised
    pub created_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Create an event stamped with the current time
    pub fn new(kind: AlertKind) -> Self {
        Self::at(kind, Utc::now())
    }

    /// Create an event with an explicit creation time
    pub fn at(kind: AlertKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            created_at,
        }
    }

    /// Low-balance alert for `reading`
    pub fn low_balance(reading: BalanceReading, threshold: f64) -> Self {
        Self::new(AlertKind::LowBalance { reading, threshold })
    }

    /// Repeated-failure alert for a streak of `count` ticks
    pub fn repeated_failure(count: u32) -> Self {
        Self::new(AlertKind::RepeatedFailure { count })
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self.kind {
            AlertKind::LowBalance { .. } => "low_balance",
            AlertKind::RepeatedFailure { .. } => "repeated_failure",
        }
    }
}
