//! Telegram bot commands
//!
//! Chats subscribe, link to a user account, pause and resume notifications
//! by talking to the bot. Every command is answered through the notifier.

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::entities::notification_recipients;
use crate::services::delivery::{DeliveryOutcome, Destination, Notifier};
use crate::services::recipients;

/// Subset of a Telegram `Update` the bot reacts to
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(Option<String>),
    Help,
    Status,
    Stop,
    Resume,
    Unknown,
}

/// Parse a message text; `/cmd@botname` is accepted
pub fn parse_command(text: &str) -> Command {
    let mut parts = text.split_whitespace();
    let Some(head) = parts.next() else {
        return Command::Unknown;
    };

    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let argument = parts.next().map(str::to_string);

    match name.as_str() {
        "/start" => Command::Start(argument),
        "/help" => Command::Help,
        "/status" => Command::Status,
        "/stop" => Command::Stop,
        "/resume" => Command::Resume,
        _ => Command::Unknown,
    }
}

const HELP_TEXT: &str = "Sales tracker bot commands:\n\
/start - subscribe this chat to notifications\n\
/start <login or email> - subscribe and link your account\n\
/status - show subscription status\n\
/stop - pause notifications\n\
/resume - resume notifications\n\
/help - show this message";

const NOT_SUBSCRIBED_TEXT: &str = "This chat is not subscribed. Send /start to subscribe.";

pub struct TelegramWebhookService {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
}

impl TelegramWebhookService {
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Handle one update; returns the reply text, `None` for ignored updates
    pub async fn handle_update(
        &self,
        update: &TelegramUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, DbErr> {
        let Some(message) = &update.message else {
            return Ok(None);
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(None);
        };

        let chat_id = message.chat.id.to_string();
        let username = message.from.as_ref().and_then(|from| from.username.as_deref());
        let command = parse_command(text);

        info!(update_id = update.update_id, chat_id = %chat_id, command = ?command, "Telegram command");

        let reply = match command {
            Command::Start(hint) => self.start(&chat_id, username, hint.as_deref(), now).await?,
            Command::Status => self.status(&chat_id).await?,
            Command::Stop => self.stop(&chat_id, now).await?,
            Command::Resume => self.resume(&chat_id, username, now).await?,
            Command::Help | Command::Unknown => HELP_TEXT.to_string(),
        };

        self.reply(&chat_id, &reply).await;
        Ok(Some(reply))
    }

    async fn start(
        &self,
        chat_id: &str,
        username: Option<&str>,
        hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, DbErr> {
        let (recipient, created) = recipients::upsert_telegram_chat(&self.db, chat_id, username, now).await?;

        let Some(hint) = hint else {
            return Ok(if created {
                "Subscribed to sales notifications. Send /start <login> to link your account.".to_string()
            } else {
                "This chat is already subscribed. Send /status for details.".to_string()
            });
        };

        let Some(user) = recipients::find_user_by_login_hint(&self.db, hint).await? else {
            return Ok(format!("No account found for '{}'. Check the login and try again.", hint));
        };

        match recipient.user_id {
            Some(linked) if linked == user.id => {
                Ok(format!("This chat is already linked to {}.", user.login))
            }
            Some(linked) => {
                warn!(chat_id = %chat_id, linked_user_id = linked, requested_user_id = user.id, "Refusing to relink chat");
                Ok("This chat is already linked to another account.".to_string())
            }
            None => {
                let recipient = recipients::link_user(&self.db, recipient, &user, now).await?;
                info!(recipient_id = recipient.id, user_id = user.id, "Linked Telegram chat to user");
                Ok(format!("Linked this chat to {}. You will receive notifications here.", user.login))
            }
        }
    }

    async fn status(&self, chat_id: &str) -> Result<String, DbErr> {
        let Some(recipient) = recipients::find_by_chat_id(&self.db, chat_id).await? else {
            return Ok(NOT_SUBSCRIBED_TEXT.to_string());
        };

        let account = match recipient.user_id {
            Some(user_id) => recipients::find_user(&self.db, user_id)
                .await?
                .map(|user| user.login)
                .unwrap_or_else(|| format!("user #{}", user_id)),
            None => "not linked".to_string(),
        };

        Ok(status_text(&recipient, &account))
    }

    async fn stop(&self, chat_id: &str, now: DateTime<Utc>) -> Result<String, DbErr> {
        let Some(recipient) = recipients::find_by_chat_id(&self.db, chat_id).await? else {
            return Ok(NOT_SUBSCRIBED_TEXT.to_string());
        };

        recipients::set_telegram_enabled(&self.db, recipient, false, now).await?;
        Ok("Notifications paused. Send /resume to turn them back on.".to_string())
    }

    async fn resume(
        &self,
        chat_id: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, DbErr> {
        let (recipient, _) = recipients::upsert_telegram_chat(&self.db, chat_id, username, now).await?;
        recipients::set_telegram_enabled(&self.db, recipient, true, now).await?;
        Ok("Notifications resumed.".to_string())
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        match self
            .notifier
            .deliver(&Destination::Telegram(chat_id.to_string()), text)
            .await
        {
            DeliveryOutcome::Delivered => {}
            DeliveryOutcome::Failed(reason) => {
                warn!(chat_id = %chat_id, reason = %reason, "Failed to reply to Telegram command");
            }
            DeliveryOutcome::Disabled => {
                warn!(chat_id = %chat_id, "Telegram not configured - command reply dropped");
            }
        }
    }
}

fn status_text(recipient: &notification_recipients::Model, account: &str) -> String {
    let state = if recipient.active && recipient.telegram_enabled {
        "on"
    } else {
        "paused"
    };
    format!("Notifications: {}\nLinked account: {}", state, account)
}
