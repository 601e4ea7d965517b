//! Alerting for WattGuard
//!
//! Provides the cooldown gate, alert rendering and notification delivery.

mod gate;
mod notifier;
mod render;

pub use gate::{AlertGate, AlertGateState, DEFAULT_COOLDOWN_HOURS};
pub use notifier::{AnyNotifier, EmailNotifier, LogNotifier, NotificationError, Notifier};
pub use render::{render, RenderedAlert};
