//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::io;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::alerting::Notifier;
use crate::fetch::{BalanceSource, FetchOutcome};

/// Replays a fixed list of outcomes, then repeats a fallback.
pub(crate) struct ScriptedSource {
    outcomes: Mutex<VecDeque<FetchOutcome>>,
    fallback: FetchOutcome,
    calls: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedSource {
    pub(crate) fn new(outcomes: impl IntoIterator<Item = FetchOutcome>, fallback: FetchOutcome) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    pub(crate) fn repeating(outcome: FetchOutcome) -> Self {
        Self::new([], outcome)
    }

    /// Cancel `token` once `calls` fetches have been served.
    pub(crate) fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BalanceSource for ScriptedSource {
    async fn fetch(&self) -> FetchOutcome {
        let served = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if served >= *limit {
                token.cancel();
            }
        }
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub(crate) subject: String,
    pub(crate) body: String,
    pub(crate) is_html: bool,
}

/// Records every message and answers with a configurable result.
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    succeed: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed: AtomicBool::new(true),
        }
    }

    pub(crate) fn failing() -> Self {
        let notifier = Self::new();
        notifier.set_succeed(false);
        notifier
    }

    pub(crate) fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str, is_html: bool) -> bool {
        self.sent.lock().unwrap().push(SentMessage {
            subject: subject.to_string(),
            body: body.to_string(),
            is_html,
        });
        self.succeed.load(Ordering::SeqCst)
    }
}

/// Collects formatted log output for the current thread while the guard lives.
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
