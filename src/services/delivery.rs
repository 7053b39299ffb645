//! Notification delivery adapter
//!
//! Best-effort single-message delivery to one destination. No retries here:
//! the dedup ledger only records successful sends, so the next scheduled pass
//! naturally re-attempts anything that failed.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::entities::notification_recipients;
use crate::services::email::EmailService;
use crate::services::telegram::TelegramService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Telegram(String),
    Email(String),
}

impl Destination {
    pub fn channel(&self) -> &'static str {
        match self {
            Destination::Telegram(_) => "telegram",
            Destination::Email(_) => "email",
        }
    }
}

/// Result of one delivery attempt
///
/// `Failed` carries a reason for logs only, never shown to end users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    /// Channel credentials are not configured, or the recipient has no usable channel
    Disabled,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Channel not configured")]
    NotConfigured,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Provider rejected message: {0}")]
    Api(String),
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Email error: {0}")]
    Email(String),
}

impl From<Result<(), DeliveryError>> for DeliveryOutcome {
    fn from(result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(DeliveryError::NotConfigured) => DeliveryOutcome::Disabled,
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Seam between the scheduler/sync engine and the outside world
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, destination: &Destination, text: &str) -> DeliveryOutcome;

    /// Whether the email channel is switched on network-wide
    fn email_enabled(&self) -> bool;

    /// Whether any channel has credentials at all
    fn is_configured(&self) -> bool;
}

/// Production notifier: Telegram Bot API plus optional SMTP
pub struct DeliveryService {
    telegram: TelegramService,
    email: Option<EmailService>,
}

impl DeliveryService {
    pub fn new(telegram: TelegramService, email: Option<EmailService>) -> Self {
        Self { telegram, email }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let telegram = TelegramService::new(&config.telegram, config.outbound_timeout);

        let email = config.email.as_ref().and_then(|email_config| {
            match EmailService::new(email_config, config.outbound_timeout) {
                Ok(service) => Some(service),
                Err(e) => {
                    warn!(error = %e, "Failed to initialize email channel - email disabled");
                    None
                }
            }
        });

        Self::new(telegram, email)
    }
}

#[async_trait]
impl Notifier for DeliveryService {
    async fn deliver(&self, destination: &Destination, text: &str) -> DeliveryOutcome {
        match destination {
            Destination::Telegram(chat_id) => self.telegram.send_message(chat_id, text).await.into(),
            Destination::Email(address) => match &self.email {
                Some(email) => email.send(address, text).await.into(),
                None => DeliveryOutcome::Disabled,
            },
        }
    }

    fn email_enabled(&self) -> bool {
        self.email.is_some()
    }

    fn is_configured(&self) -> bool {
        self.telegram.is_configured() || self.email.is_some()
    }
}

/// Deliver `text` to every usable channel of one recipient
///
/// Telegram first, then email when switched on. Delivered if any channel
/// succeeded; `Disabled` if the recipient has no usable channel at all.
pub async fn deliver_to_recipient(
    notifier: &dyn Notifier,
    recipient: &notification_recipients::Model,
    text: &str,
) -> DeliveryOutcome {
    let mut destinations = Vec::with_capacity(2);
    if let Some(chat_id) = recipient.telegram_target() {
        destinations.push(Destination::Telegram(chat_id.to_string()));
    }
    if notifier.email_enabled() {
        if let Some(address) = recipient.email_target() {
            destinations.push(Destination::Email(address.to_string()));
        }
    }

    if destinations.is_empty() {
        return DeliveryOutcome::Disabled;
    }

    let mut delivered = false;
    let mut failures = Vec::new();

    for destination in &destinations {
        match notifier.deliver(destination, text).await {
            DeliveryOutcome::Delivered => {
                debug!(recipient_id = recipient.id, channel = destination.channel(), "Delivered");
                delivered = true;
            }
            DeliveryOutcome::Failed(reason) => {
                warn!(
                    recipient_id = recipient.id,
                    channel = destination.channel(),
                    reason = %reason,
                    "Delivery failed"
                );
                failures.push(format!("{}: {}", destination.channel(), reason));
            }
            DeliveryOutcome::Disabled => {
                debug!(recipient_id = recipient.id, channel = destination.channel(), "Channel disabled");
            }
        }
    }

    if delivered {
        DeliveryOutcome::Delivered
    } else if failures.is_empty() {
        DeliveryOutcome::Disabled
    } else {
        DeliveryOutcome::Failed(failures.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    struct ScriptedNotifier {
        email_on: bool,
        fail_channel: Option<&'static str>,
        seen: Mutex<Vec<Destination>>,
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn deliver(&self, destination: &Destination, _text: &str) -> DeliveryOutcome {
            self.seen.lock().unwrap().push(destination.clone());
            if self.fail_channel == Some(destination.channel()) {
                DeliveryOutcome::Failed("boom".to_string())
            } else {
                DeliveryOutcome::Delivered
            }
        }

        fn email_enabled(&self) -> bool {
            self.email_on
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn recipient(chat: Option<&str>, email: Option<&str>) -> notification_recipients::Model {
        notification_recipients::Model {
            id: 7,
            user_id: None,
            email: email.map(String::from),
            telegram_chat_id: chat.map(String::from),
            telegram_username: None,
            email_enabled: true,
            telegram_enabled: true,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_email_skipped_when_globally_disabled() {
        let notifier = ScriptedNotifier { email_on: false, fail_channel: None, seen: Mutex::new(vec![]) };
        let outcome = deliver_to_recipient(&notifier, &recipient(Some("42"), Some("a@b.c")), "hi").await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(*notifier.seen.lock().unwrap(), vec![Destination::Telegram("42".into())]);
    }

    #[tokio::test]
    async fn test_any_channel_success_counts_as_delivered() {
        let notifier = ScriptedNotifier { email_on: true, fail_channel: Some("telegram"), seen: Mutex::new(vec![]) };
        let outcome = deliver_to_recipient(&notifier, &recipient(Some("42"), Some("a@b.c")), "hi").await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(notifier.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_usable_channel_is_disabled() {
        let notifier = ScriptedNotifier { email_on: false, fail_channel: None, seen: Mutex::new(vec![]) };
        let outcome = deliver_to_recipient(&notifier, &recipient(None, Some("a@b.c")), "hi").await;
        assert_eq!(outcome, DeliveryOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_failure_reason_is_reported() {
        let notifier = ScriptedNotifier { email_on: false, fail_channel: Some("telegram"), seen: Mutex::new(vec![]) };
        let outcome = deliver_to_recipient(&notifier, &recipient(Some("42"), None), "hi").await;
        assert_eq!(outcome, DeliveryOutcome::Failed("telegram: boom".to_string()));
    }

    #[test]
    fn test_not_configured_maps_to_disabled() {
        let outcome: DeliveryOutcome = Err(DeliveryError::NotConfigured).into();
        assert_eq!(outcome, DeliveryOutcome::Disabled);
    }
}
