//! Outcome notifications over SMTP
//!
//! Notifications are advisory: a failed send is logged and swallowed, never
//! propagated into the processing pipeline. Depending on
//! [`NotifyMode`](crate::config::NotifyMode) the pipeline sends one mail
//! per message or a single digest per batch.

use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Sink for human-facing outcome notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification. Implementations report errors; callers
    /// decide whether to swallow them.
    async fn send(&self, subject: &str, body: &str) -> Result<()>;

    /// Whether this notifier will actually deliver anything.
    fn is_enabled(&self) -> bool;
}

/// Fire a notification without letting a delivery failure disturb the
/// caller.
pub async fn notify_best_effort(notifier: &dyn Notifier, subject: &str, body: &str) {
    if !notifier.is_enabled() {
        return;
    }
    if let Err(e) = notifier.send(subject, body).await {
        tracing::warn!(error = %e, subject, "notification delivery failed");
    }
}

/// SMTP notifier over a STARTTLS relay
pub struct SmtpNotifier {
    config: NotifyConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpNotifier {
    /// Build from configuration. Without a relay host or recipients the
    /// notifier stays disabled and every send is a no-op.
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let transport = match (&config.smtp_host, config.recipients.is_empty()) {
            (Some(host), false) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| Error::Config {
                        message: format!("failed to create SMTP relay: {e}"),
                        key: Some("smtp_host".to_string()),
                    })?
                    .port(config.smtp_port);
                if let (Some(user), Some(password)) = (&config.smtp_user, &config.smtp_password) {
                    builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
                }
                Some(builder.build())
            }
            _ => None,
        };
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let transport = match &self.transport {
            Some(t) => t,
            None => return Ok(()),
        };
        let from = self.config.from.as_deref().unwrap_or("portal-sync@localhost");
        let from_mailbox = from.parse().map_err(|e| Error::Config {
            message: format!("invalid from address: {e}"),
            key: Some("from".to_string()),
        })?;

        let mut builder = Message::builder().from(from_mailbox).subject(subject);
        for recipient in &self.config.recipients {
            let mailbox = recipient.parse().map_err(|e| Error::Config {
                message: format!("invalid recipient {recipient}: {e}"),
                key: Some("recipients".to_string()),
            })?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Other(format!("failed to build mail: {e}")))?;

        transport
            .send(message)
            .await
            .map_err(|e| Error::Other(format!("failed to send mail: {e}")))?;

        tracing::info!(subject, recipients = self.config.recipients.len(), "notification sent");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }
}

/// Recording notifier for tests
pub struct MockNotifier {
    send_count: std::sync::atomic::AtomicU64,
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    /// Empty recorder.
    pub fn new() -> Self {
        Self {
            send_count: std::sync::atomic::AtomicU64::new(0),
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of notifications sent so far.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// All `(subject, body)` pairs recorded so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        self.send_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((subject.to_string(), body.to_string()));
        }
        tracing::info!(subject, "[MOCK] notification would be sent");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
