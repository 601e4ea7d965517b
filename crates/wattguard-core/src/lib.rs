//! # WattGuard
//!
//! Prepaid electricity balance monitor.
//!
//! WattGuard periodically queries a campus utility endpoint for the remaining
//! electricity balance of a dormitory meter, validates the response, and sends
//! a notification when the balance drops below a threshold or when the data
//! source keeps failing.
//!
//! ## Architecture
//!
//! - **Fetch**: HTTP client with bounded retries for the balance endpoint
//! - **Parser**: Validates the upstream JSON into a typed reading
//! - **Alerting**: Cooldown gate, message rendering and delivery (SMTP or log)
//! - **Monitor**: The periodic loop tying the above together
//!
//! ## Quick Start
//!
//! ```bash
//! # Check the configuration
//! wattguard --config wattguard.toml validate
//!
//! # Run a single check
//! wattguard --config wattguard.toml check
//!
//! # Monitor until interrupted
//! wattguard --config wattguard.toml run
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod parser;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertGate, AnyNotifier, Notifier};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::fetch::{BalanceSource, FetchOutcome, Fetcher};
    pub use crate::models::*;
    pub use crate::monitor::{MonitorLoop, TickReport};
    pub use crate::parser::{parse, ParseOutcome};
}
