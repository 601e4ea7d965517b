//! Periodic balance monitor

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{MonitorState, Phase};
use crate::alerting::{AlertGate, Notifier};
use crate::config::Config;
use crate::fetch::{BalanceSource, FetchErrorKind, FetchOutcome};
use crate::models::{AlertEvent, BalanceReading};
use crate::parser::{parse, ParseErrorKind, ParseOutcome};

/// What a single tick produced
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// A reading at or above the threshold
    Healthy(BalanceReading),
    /// A reading below the threshold; `delivered` is the gate's answer
    LowBalance {
        /// The low reading
        reading: BalanceReading,
        /// Whether an alert was delivered
        delivered: bool,
    },
    /// The fetch failed
    FetchFailed {
        /// Failure classification
        error: FetchErrorKind,
        /// Streak length after this tick
        consecutive_failures: u32,
        /// Gate answer when the streak triggered escalation
        escalation: Option<bool>,
    },
    /// The payload was rejected
    ParseFailed {
        /// Failure classification
        error: ParseErrorKind,
        /// Streak length after this tick
        consecutive_failures: u32,
        /// Gate answer when the streak triggered escalation
        escalation: Option<bool>,
    },
}

impl TickReport {
    /// The reading, when the tick produced one
    pub fn reading(&self) -> Option<&BalanceReading> {
        match self {
            Self::Healthy(reading) | Self::LowBalance { reading, .. } => Some(reading),
            Self::FetchFailed { .. } | Self::ParseFailed { .. } => None,
        }
    }
}

/// Drives fetch, parse and evaluate once per interval
///
/// One tick runs to completion before the next begins. Cancellation is
/// observed between ticks; a panic inside a tick is logged and followed by
/// a backoff, never propagated.
pub struct MonitorLoop<S, N> {
    source: S,
    notifier: N,
    gate: AlertGate,
    state: MonitorState,
    phase: Phase,
    fault_backoff: Duration,
}

impl<S, N> MonitorLoop<S, N>
where
    S: BalanceSource,
    N: Notifier,
{
    /// Create a monitor from its collaborators and the configuration
    pub fn new(source: S, notifier: N, config: &Config) -> Self {
        Self {
            source,
            notifier,
            gate: AlertGate::new(config.alerting.cooldown()),
            state: MonitorState::new(&config.monitor),
            phase: Phase::Fetching,
            fault_backoff: config.monitor.fault_backoff(),
        }
    }

    /// Loop state
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Alert gate
    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Balance source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Notifier
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "Monitor phase change");
        self.phase = phase;
    }

    /// Run one fetch, parse and evaluate cycle
    pub async fn tick(&mut self) -> TickReport {
        self.enter(Phase::Fetching);
        info!("Checking electricity balance");

        let payload = match self.source.fetch().await {
            FetchOutcome::Success(payload) => payload,
            FetchOutcome::Failure(error) => {
                let consecutive_failures = self.state.record_failure();
                warn!(%error, consecutive_failures, "Balance fetch failed");
                let escalation = self.escalate().await;
                self.enter(Phase::Sleeping);
                return TickReport::FetchFailed {
                    error,
                    consecutive_failures,
                    escalation,
                };
            }
        };

        self.enter(Phase::Parsing);
        let reading = match parse(&payload) {
            ParseOutcome::Success(reading) => reading,
            ParseOutcome::Failure(error) => {
                let consecutive_failures = self.state.record_failure();
                if let ParseErrorKind::CredentialExpired { code, message } = &error {
                    error!(
                        severity = "critical",
                        code = %code,
                        message = %message,
                        "Session cookie has expired; update endpoint.cookie"
                    );
                }
                warn!(%error, consecutive_failures, "Balance response rejected");
                let escalation = self.escalate().await;
                self.enter(Phase::Sleeping);
                return TickReport::ParseFailed {
                    error,
                    consecutive_failures,
                    escalation,
                };
            }
        };

        self.enter(Phase::Evaluating);
        self.state.record_success();
        let threshold = self.state.threshold();
        info!(%reading, "Balance reading parsed");

        let report = if reading.is_below(threshold) {
            warn!(
                balance = reading.balance(),
                threshold, "Electricity balance below threshold"
            );
            let event = AlertEvent::low_balance(reading, threshold);
            let delivered = self.gate.try_send(&event, &self.notifier).await;
            TickReport::LowBalance { reading, delivered }
        } else {
            info!(balance = reading.balance(), threshold, "Electricity balance normal");
            TickReport::Healthy(reading)
        };

        self.enter(Phase::Sleeping);
        report
    }

    async fn escalate(&mut self) -> Option<bool> {
        if !self.state.should_escalate() {
            return None;
        }
        let count = self.state.consecutive_failures();
        error!(
            consecutive_failures = count,
            "Balance data unavailable for too many consecutive checks"
        );
        let event = AlertEvent::repeated_failure(count);
        Some(self.gate.try_send(&event, &self.notifier).await)
    }

    /// Tick until `cancel` fires
    ///
    /// The first tick starts immediately.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            interval = %humantime::format_duration(self.state.interval()),
            threshold = self.state.threshold(),
            max_consecutive_failures = self.state.max_consecutive_failures(),
            "Balance monitor started"
        );

        while !cancel.is_cancelled() {
            let pause = match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(report) => {
                    debug!(?report, "Tick finished");
                    self.state.interval()
                }
                Err(panic) => {
                    error!(
                        fault = %panic_message(panic.as_ref()),
                        backoff = %humantime::format_duration(self.fault_backoff),
                        "Unexpected fault during balance check"
                    );
                    self.fault_backoff
                }
            };

            self.enter(Phase::Sleeping);
            let next_check = chrono::Duration::from_std(pause)
                .ok()
                .and_then(|d| Utc::now().checked_add_signed(d));
            if let Some(next_check) = next_check {
                info!(
                    next_check = %next_check.format("%Y-%m-%d %H:%M:%S UTC"),
                    "Waiting for next check"
                );
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        info!("Balance monitor stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
