//! SMTP email channel
//!
//! Switched off network-wide by default (`EMAIL_NOTIFICATIONS_ENABLED`);
//! kept as the second best-effort channel for when it is re-enabled.

use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

use crate::config::EmailConfig;
use crate::services::delivery::DeliveryError;

const EMAIL_SUBJECT: &str = "Sales tracker notification";

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| DeliveryError::Email(format!("Invalid SMTP relay: {}", e)))?
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .timeout(Some(timeout))
            .build();

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::Email(format!("Invalid sender address: {}", e)))?;

        Ok(Self { transport, from })
    }

    pub async fn send(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::Email(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .map_err(|e| DeliveryError::Email(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Email(e.to_string()))?;

        debug!("Email notification sent");
        Ok(())
    }
}
