//! Cooldown-gated alert dispatch

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::notifier::Notifier;
use super::render::render;
use crate::models::AlertEvent;

/// Default minimum spacing between delivered alerts
pub const DEFAULT_COOLDOWN_HOURS: i64 = 6;

/// Delivery bookkeeping owned by an [`AlertGate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertGateState {
    /// When the last alert was confirmed delivered
    pub last_delivery: Option<DateTime<Utc>>,
    /// Minimum spacing between deliveries
    pub cooldown: chrono::Duration,
}

impl Default for AlertGateState {
    fn default() -> Self {
        Self {
            last_delivery: None,
            cooldown: chrono::Duration::hours(DEFAULT_COOLDOWN_HOURS),
        }
    }
}

/// Forwards alerts to a notifier at most once per cooldown window
///
/// Low-balance and repeated-failure alerts share one window.
#[derive(Debug, Clone, Default)]
pub struct AlertGate {
    state: AlertGateState,
}

impl AlertGate {
    /// Create a gate with the given cooldown
    pub fn new(cooldown: chrono::Duration) -> Self {
        Self {
            state: AlertGateState {
                last_delivery: None,
                cooldown,
            },
        }
    }

    /// Current bookkeeping
    pub fn state(&self) -> &AlertGateState {
        &self.state
    }

    /// Whether an alert raised at `now` would be forwarded
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.state
            .last_delivery
            .map_or(true, |last| now - last > self.state.cooldown)
    }

    /// Try to deliver `event`, returning whether the notifier confirmed delivery
    ///
    /// The event's creation time is the clock: the window is measured from the
    /// last confirmed delivery to `event.created_at`. Suppressed and failed
    /// sends leave the window untouched.
    pub async fn try_send<N>(&mut self, event: &AlertEvent, notifier: &N) -> bool
    where
        N: Notifier + ?Sized,
    {
        let now = event.created_at;
        if !self.is_open_at(now) {
            info!(
                event_id = %event.id,
                kind = event.label(),
                last_delivery = ?self.state.last_delivery,
                "Alert suppressed by cooldown"
            );
            return false;
        }

        let rendered = render(event, self.state.cooldown);
        if notifier
            .send(&rendered.subject, &rendered.body, rendered.is_html)
            .await
        {
            self.state.last_delivery = Some(now);
            info!(event_id = %event.id, kind = event.label(), "Alert delivered");
            true
        } else {
            warn!(event_id = %event.id, kind = event.label(), "Alert delivery failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertKind, BalanceReading};
    use crate::testing::RecordingNotifier;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn low_at(hours: i64) -> AlertEvent {
        let reading = BalanceReading::new(5.0, 3.0, 0.6, 0.0, 1_700_000_000_000);
        AlertEvent::at(
            AlertKind::LowBalance {
                reading,
                threshold: 20.0,
            },
            start() + Duration::hours(hours),
        )
    }

    #[tokio::test]
    async fn test_low_balance_cooldown_window() {
        let notifier = RecordingNotifier::new();
        let mut gate = AlertGate::new(Duration::hours(6));

        assert!(gate.try_send(&low_at(0), &notifier).await);
        assert!(!gate.try_send(&low_at(1), &notifier).await);
        assert_eq!(notifier.count(), 1);

        assert!(gate.try_send(&low_at(7), &notifier).await);
        assert_eq!(notifier.count(), 2);
        assert_eq!(gate.state().last_delivery, Some(start() + Duration::hours(7)));
    }

    #[tokio::test]
    async fn test_cooldown_boundary_is_inclusive() {
        let notifier = RecordingNotifier::new();
        let mut gate = AlertGate::new(Duration::hours(6));

        assert!(gate.try_send(&low_at(0), &notifier).await);
        // exactly one cooldown later is still inside the window
        assert!(!gate.try_send(&low_at(6), &notifier).await);

        let just_after = AlertEvent::at(
            low_at(6).kind,
            start() + Duration::hours(6) + Duration::seconds(1),
        );
        assert!(gate.try_send(&just_after, &notifier).await);
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_window_open() {
        let notifier = RecordingNotifier::failing();
        let mut gate = AlertGate::new(Duration::hours(6));

        assert!(!gate.try_send(&low_at(0), &notifier).await);
        assert_eq!(gate.state().last_delivery, None);

        notifier.set_succeed(true);
        assert!(gate.try_send(&low_at(1), &notifier).await);
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_window_is_shared_between_kinds() {
        let notifier = RecordingNotifier::new();
        let mut gate = AlertGate::default();

        assert!(gate.try_send(&low_at(0), &notifier).await);
        let failure = AlertEvent::at(
            AlertKind::RepeatedFailure { count: 5 },
            start() + Duration::hours(2),
        );
        assert!(!gate.try_send(&failure, &notifier).await);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_forwards_rendered_message() {
        let notifier = RecordingNotifier::new();
        let mut gate = AlertGate::default();

        gate.try_send(&low_at(0), &notifier).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("5 kWh"));
        assert!(sent[0].is_html);
    }
}
