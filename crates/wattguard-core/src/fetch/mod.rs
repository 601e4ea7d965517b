//! Balance acquisition
//!
//! [`Fetcher`] queries the balance endpoint over HTTP with a bounded,
//! fixed-delay retry budget. Callers depend on the [`BalanceSource`] trait so
//! the monitor loop can be driven by any source of [`FetchOutcome`]s.

mod client;
mod retry;

pub use client::Fetcher;
pub use retry::RetryPolicy;

use thiserror::Error;

use crate::models::RawPayload;

/// HTTP statuses treated as transient.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Why a fetch produced no payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    /// The request timed out
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or broke mid-request
    #[error("connection failure")]
    ConnectionFailure,

    /// The service answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The body was not valid JSON
    #[error("malformed response body")]
    MalformedResponse,

    /// The request could not be issued or its redirects not followed
    #[error("request rejected before a response was obtained")]
    RequestRejected,
}

impl FetchErrorKind {
    /// Whether a later attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailure => true,
            Self::HttpStatus(code) => RETRYABLE_STATUSES.contains(code),
            Self::MalformedResponse | Self::RequestRejected => false,
        }
    }

    /// Classify a transport-level `reqwest` error
    ///
    /// Builder errors (such as an unsupported URL scheme) and exhausted
    /// redirect chains map to [`Self::RequestRejected`].
    pub(crate) fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::MalformedResponse
        } else if error.is_connect() || error.is_request() || error.is_body() {
            Self::ConnectionFailure
        } else {
            Self::RequestRejected
        }
    }
}

/// Result of one fetch invocation
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The endpoint returned a decodable payload
    Success(RawPayload),
    /// No payload could be obtained within the retry budget
    Failure(FetchErrorKind),
}

impl FetchOutcome {
    /// Convert into a standard `Result`
    pub fn into_result(self) -> Result<RawPayload, FetchErrorKind> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Failure(kind) => Err(kind),
        }
    }
}

/// Anything that can produce balance payloads
#[async_trait::async_trait]
pub trait BalanceSource: Send + Sync {
    /// Perform one fetch, including any retries
    async fn fetch(&self) -> FetchOutcome;
}
