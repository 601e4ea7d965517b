//! Configuration management for WattGuard
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! `WATTGUARD__`-prefixed environment variables (`WATTGUARD__MONITOR__THRESHOLD=15`).
//! The resulting [`Config`] is immutable and handed to each component by reference.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fetch::RetryPolicy;

/// Placeholder shipped in sample configurations for the session cookie.
pub const COOKIE_PLACEHOLDER: &str = "YOUR_COOKIE_HERE";

const SENDER_PLACEHOLDER: &str = "your_email@qq.com";
const PASSWORD_PLACEHOLDER: &str = "your_smtp_password";
const RECEIVER_PLACEHOLDER: &str = "receiver@example.com";

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "WATTGUARD";

const MAX_COOLDOWN_SECONDS: i64 = 100 * 365 * 24 * 3600;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Balance endpoint configuration
    pub endpoint: EndpointConfig,

    /// Monitor loop configuration
    pub monitor: MonitorConfig,

    /// Alerting configuration
    pub alerting: AlertingConfig,

    /// SMTP configuration
    pub smtp: SmtpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Balance endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Full query URL, including the report-type parameter
    pub url: String,
    /// Referer header expected by the service
    pub referer: String,
    /// Browser-like user agent
    pub user_agent: String,
    /// Session cookie; must be refreshed by hand when it expires
    pub cookie: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Total attempts per fetch, including the first
    pub max_retries: u32,
    /// Fixed delay between attempts in seconds
    pub retry_delay_seconds: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://sd.sontan.net/sdms-pay-weixin-gzzq/service/ammeterBalance?type=1"
                .to_string(),
            referer: "http://sd.sontan.net/sdms-pay-weixin-gzzq/newWeixin/ele/eleInfo.html"
                .to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 \
                MicroMessenger/7.0.20.1781(0x6700143B)"
                .to_string(),
            cookie: COOKIE_PLACEHOLDER.to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
        }
    }
}

impl EndpointConfig {
    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Retry policy derived from `max_retries` and `retry_delay_seconds`
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_seconds))
    }
}

/// Monitor loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Alert when the remaining balance is strictly below this value
    pub threshold: f64,
    /// Seconds between ticks
    pub check_interval_seconds: u64,
    /// Consecutive failed ticks before a repeated-failure alert
    pub max_consecutive_failures: u32,
    /// Backoff after an unexpected fault inside a tick
    pub fault_backoff_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: 20.0,
            check_interval_seconds: 3600,
            max_consecutive_failures: 5,
            fault_backoff_seconds: 60,
        }
    }
}

impl MonitorConfig {
    /// Tick interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Fault backoff as a [`Duration`]
    pub fn fault_backoff(&self) -> Duration {
        Duration::from_secs(self.fault_backoff_seconds)
    }
}

/// Notification channel used for alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    /// SMTP email
    #[default]
    Email,
    /// Write alerts to the log only (dry run)
    Log,
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Minimum seconds between two delivered alerts
    pub cooldown_seconds: u64,
    /// Delivery channel
    pub channel: NotifyChannel,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 6 * 3600,
            channel: NotifyChannel::Email,
        }
    }
}

impl AlertingConfig {
    /// Cooldown as a [`chrono::Duration`], capped at roughly a century
    pub fn cooldown(&self) -> chrono::Duration {
        let secs = i64::try_from(self.cooldown_seconds)
            .unwrap_or(i64::MAX)
            .min(MAX_COOLDOWN_SECONDS);
        chrono::Duration::seconds(secs)
    }
}

/// SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// SMTP server host
    pub server: String,
    /// SMTP server port
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise
    pub use_ssl: bool,
    /// Sender address, also the login user
    pub sender_email: String,
    /// SMTP password or authorization code
    pub sender_password: String,
    /// Alert recipient
    pub receiver_email: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "smtp.qq.com".to_string(),
            port: 465,
            use_ssl: true,
            sender_email: SENDER_PLACEHOLDER.to_string(),
            sender_password: PASSWORD_PLACEHOLDER.to_string(),
            receiver_email: RECEIVER_PLACEHOLDER.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
    /// Optional log file, written in addition to the console
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let merged = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(merged.try_deserialize()?)
    }

    /// Collect every configuration problem
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.endpoint.cookie.trim().is_empty() || self.endpoint.cookie == COOKIE_PLACEHOLDER {
            problems.push("endpoint.cookie is not configured".to_string());
        }
        match url::Url::parse(&self.endpoint.url) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                problems.push(format!(
                    "endpoint.url must use http or https, not '{}'",
                    url.scheme()
                ));
            }
            Ok(_) => {}
            Err(e) => problems.push(format!("endpoint.url is invalid: {e}")),
        }
        if self.endpoint.max_retries == 0 {
            problems.push("endpoint.max_retries must be at least 1".to_string());
        }
        if !self.monitor.threshold.is_finite() || self.monitor.threshold <= 0.0 {
            problems.push("monitor.threshold must be a positive number".to_string());
        }
        if self.monitor.check_interval_seconds == 0 {
            problems.push("monitor.check_interval_seconds must be positive".to_string());
        }
        if self.monitor.max_consecutive_failures == 0 {
            problems.push("monitor.max_consecutive_failures must be at least 1".to_string());
        }

        if self.alerting.channel == NotifyChannel::Email {
            let smtp = &self.smtp;
            if smtp.sender_email == SENDER_PLACEHOLDER {
                problems.push("smtp.sender_email is not configured".to_string());
            }
            if smtp.sender_password == PASSWORD_PLACEHOLDER {
                problems.push("smtp.sender_password is not configured".to_string());
            }
            if smtp.receiver_email == RECEIVER_PLACEHOLDER {
                problems.push("smtp.receiver_email is not configured".to_string());
            }
        }

        problems
    }

    /// Fail with every configuration problem joined into one error
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(problems.join("; ")))
        }
    }
}
