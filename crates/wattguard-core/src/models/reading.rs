//! Balance reading data models

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Decoded response body from the balance endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(serde_json::Value);

impl RawPayload {
    /// Wrap an already decoded JSON value
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Decode a JSON document
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        Ok(Self(serde_json::from_str(text)?))
    }

    /// Borrow the underlying JSON value
    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RawPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A validated snapshot of the meter balance
///
/// Only [`crate::parser::parse`] constructs readings, so a value of this type
/// always has a finite, non-negative balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceReading {
    balance: f64,
    credit: f64,
    unit_price: f64,
    free_units: f64,
    timestamp_ms: i64,
}

impl BalanceReading {
    pub(crate) fn new(
        balance: f64,
        credit: f64,
        unit_price: f64,
        free_units: f64,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            balance,
            credit,
            unit_price,
            free_units,
            timestamp_ms,
        }
    }

    /// Remaining balance units (kWh)
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Remaining monetary credit
    pub fn credit(&self) -> f64 {
        self.credit
    }

    /// Price per unit
    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    /// Remaining free allowance units
    pub fn free_units(&self) -> f64 {
        self.free_units
    }

    /// Reading timestamp in epoch milliseconds, as reported upstream
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Reading timestamp as a UTC datetime, if representable
    pub fn query_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }

    /// Human-readable query time
    pub fn query_time_display(&self) -> String {
        self.query_time().map_or_else(
            || format!("{}ms", self.timestamp_ms),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
    }

    /// Whether this reading is strictly below `threshold`
    pub fn is_below(&self, threshold: f64) -> bool {
        self.balance < threshold
    }
}

impl fmt::Display for BalanceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance: {} kWh | credit: ¥{} | price: ¥{}/kWh | queried at: {}",
            self.balance,
            self.credit,
            self.unit_price,
            self.query_time_display()
        )
    }
}
