//! Notification delivery for alerts

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, warn};

use crate::config::{Config, NotifyChannel, SmtpConfig};
use crate::error::{Error, Result};

/// SMTP command timeout
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a rendered alert
///
/// Implementations report delivery as a plain boolean; failure details are
/// logged by the implementation itself.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message, returning whether delivery was confirmed
    async fn send(&self, subject: &str, body: &str, is_html: bool) -> bool;
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// The SMTP exchange failed
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The message could not be assembled
    #[error("Email build error: {0}")]
    Build(String),
}

/// Sends alerts over SMTP
pub struct EmailNotifier {
    from: Mailbox,
    to: Mailbox,
    server: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    /// Create an email notifier
    ///
    /// `use_ssl` selects implicit TLS (usually port 465); otherwise the
    /// connection is upgraded with STARTTLS.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .sender_email
            .parse()
            .map_err(|e| Error::email(format!("invalid sender address: {e}")))?;
        let to: Mailbox = config
            .receiver_email
            .parse()
            .map_err(|e| Error::email(format!("invalid receiver address: {e}")))?;

        let builder = if config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
        }
        .map_err(|e| Error::email(format!("invalid SMTP relay {}: {e}", config.server)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.sender_email.clone(),
                config.sender_password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            from,
            to,
            server: config.server.clone(),
            transport,
        })
    }

    async fn deliver(
        &self,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> std::result::Result<(), NotificationError> {
        let content_type = if is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(content_type)
            .body(body.to_string())
            .map_err(|e| NotificationError::Build(e.to_string()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str, is_html: bool) -> bool {
        info!(to = %self.to, server = %self.server, "Sending alert email");

        match self.deliver(subject, body, is_html).await {
            Ok(()) => {
                info!(to = %self.to, "Alert email sent");
                true
            }
            Err(NotificationError::Transport(e)) if e.is_permanent() => {
                error!(error = %e, "SMTP server rejected the message; check sender credentials");
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to send alert email");
                false
            }
        }
    }
}

/// Writes alerts to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str, is_html: bool) -> bool {
        warn!(subject, html = is_html, body_len = body.len(), "Alert (log channel)");
        true
    }
}

/// The notifier selected by `alerting.channel`
pub enum AnyNotifier {
    /// SMTP email
    Email(Box<EmailNotifier>),
    /// Log only
    Log(LogNotifier),
}

impl AnyNotifier {
    /// Build the configured notifier
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.alerting.channel {
            NotifyChannel::Email => Ok(Self::Email(Box::new(EmailNotifier::new(&config.smtp)?))),
            NotifyChannel::Log => Ok(Self::Log(LogNotifier)),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for AnyNotifier {
    async fn send(&self, subject: &str, body: &str, is_html: bool) -> bool {
        match self {
            Self::Email(email) => email.send(subject, body, is_html).await,
            Self::Log(log) => log.send(subject, body, is_html).await,
        }
    }
}
