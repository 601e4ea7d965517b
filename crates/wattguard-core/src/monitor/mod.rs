//! Balance monitoring loop
//!
//! [`MonitorLoop`] owns a [`BalanceSource`](crate::fetch::BalanceSource), a
//! [`Notifier`](crate::alerting::Notifier) and an
//! [`AlertGate`](crate::alerting::AlertGate). Each tick fetches, parses and
//! evaluates one reading, tracking the consecutive failure streak across
//! ticks and escalating once it reaches the configured maximum.

mod scheduler;
mod state;

pub use scheduler::{MonitorLoop, TickReport};
pub use state::{MonitorState, Phase};
