//! HTTP fetcher for the balance endpoint.

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{debug, error, instrument, warn};

use super::{BalanceSource, FetchErrorKind, FetchOutcome, RetryPolicy};
use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::models::RawPayload;

/// Queries the balance endpoint, retrying transient failures.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Build a fetcher from the endpoint configuration.
    ///
    /// The session cookie, referer and keep-alive headers are installed as
    /// client defaults so every attempt sends the same request.
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, header_value("referer", &config.referer)?);
        headers.insert(header::COOKIE, header_value("cookie", &config.cookie)?);
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(header_value("user_agent", &config.user_agent)?)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            retry: config.retry_policy(),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy in force.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One request, no retries.
    async fn attempt(&self) -> std::result::Result<RawPayload, FetchErrorKind> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchErrorKind::from_transport(&e))?;

        let status = response.status();
        debug!(status = %status, "Response received");
        if !status.is_success() {
            return Err(FetchErrorKind::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchErrorKind::from_transport(&e))?;

        serde_json::from_slice::<serde_json::Value>(&body)
            .map(RawPayload::new)
            .map_err(|e| {
                debug!(error = %e, len = body.len(), "Response body is not JSON");
                FetchErrorKind::MalformedResponse
            })
    }
}

#[async_trait::async_trait]
impl BalanceSource for Fetcher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> FetchOutcome {
        let mut attempt = 1;
        loop {
            match self.attempt().await {
                Ok(payload) => {
                    debug!(attempt, "Balance payload received");
                    return FetchOutcome::Success(payload);
                }
                Err(kind) if self.retry.should_retry(&kind, attempt) => {
                    let delay = self.retry.delay();
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        error = %kind,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(kind) => {
                    error!(attempt, error = %kind, "Balance fetch failed");
                    return FetchOutcome::Failure(kind);
                }
            }
        }
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::config(format!("endpoint.{name} is not a valid header value: {e}")))
}
