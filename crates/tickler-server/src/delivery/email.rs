//! Email channel over SMTP.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{DeliveryError, ReminderMessage};

/// Sends a reminder to a single email address.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, message: &ReminderMessage) -> Result<(), DeliveryError>;
}

/// SMTP relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl SmtpSettings {
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            from: from.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// STARTTLS SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. Fails on an unparseable sender or relay host.
    pub fn new(settings: &SmtpSettings) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(&settings.from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| DeliveryError::Transport(format!("SMTP relay '{}': {e}", settings.host)))?
            .port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, message: &ReminderMessage) -> Result<(), DeliveryError> {
        let email = build_email(self.from.clone(), to, message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DeliveryError::Transport(format!("email send failed: {e}")))?;

        debug!(to = %to, task_id = %message.task_id, "Reminder email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e: lettre::address::AddressError| DeliveryError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn build_email(from: Mailbox, to: &str, message: &ReminderMessage) -> Result<Message, DeliveryError> {
    Message::builder()
        .from(from)
        .to(parse_mailbox(to)?)
        .subject(message.subject.clone())
        .body(message.body.clone())
        .map_err(|e| DeliveryError::Transport(format!("failed to build email: {e}")))
}
