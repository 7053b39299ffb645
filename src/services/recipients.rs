//! Notification recipient repository
//!
//! Read side for the broadcast loops, write side for the Telegram webhook
//! commands that link, pause and resume chats.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    Order, QueryFilter, QueryOrder, Set,
};

use crate::entities::{
    notification_recipients,
    prelude::{NotificationRecipients, Users},
    users,
};

/// Active recipients reachable on at least one switched-on channel
///
/// Telegram needs the flag and a chat id; email additionally needs the
/// network-wide email switch.
pub async fn find_deliverable(
    db: &DatabaseConnection,
    email_channel_enabled: bool,
) -> Result<Vec<notification_recipients::Model>, DbErr> {
    let telegram = Condition::all()
        .add(notification_recipients::Column::TelegramEnabled.eq(true))
        .add(notification_recipients::Column::TelegramChatId.is_not_null())
        .add(notification_recipients::Column::TelegramChatId.ne(""));

    let mut channels = Condition::any().add(telegram);

    if email_channel_enabled {
        channels = channels.add(
            Condition::all()
                .add(notification_recipients::Column::EmailEnabled.eq(true))
                .add(notification_recipients::Column::Email.is_not_null())
                .add(notification_recipients::Column::Email.ne("")),
        );
    }

    NotificationRecipients::find()
        .filter(notification_recipients::Column::Active.eq(true))
        .filter(channels)
        .order_by(notification_recipients::Column::Id, Order::Asc)
        .all(db)
        .await
}

/// Active recipients with Telegram switched on and a chat id
pub async fn find_telegram_broadcast(
    db: &DatabaseConnection,
) -> Result<Vec<notification_recipients::Model>, DbErr> {
    find_deliverable(db, false).await
}

pub async fn find_by_chat_id(
    db: &DatabaseConnection,
    chat_id: &str,
) -> Result<Option<notification_recipients::Model>, DbErr> {
    NotificationRecipients::find()
        .filter(notification_recipients::Column::TelegramChatId.eq(chat_id))
        .one(db)
        .await
}

/// Find the chat's recipient row, creating a Telegram-only one if missing
///
/// Returns the row and whether it was newly created. An existing row gets
/// its username refreshed.
pub async fn upsert_telegram_chat(
    db: &DatabaseConnection,
    chat_id: &str,
    username: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(notification_recipients::Model, bool), DbErr> {
    if let Some(existing) = find_by_chat_id(db, chat_id).await? {
        let username = username.map(str::to_string);
        if username.is_some() && username != existing.telegram_username {
            let mut active = existing.into_active_model();
            active.telegram_username = Set(username);
            active.updated_at = Set(now);
            return Ok((active.update(db).await?, false));
        }
        return Ok((existing, false));
    }

    let recipient = notification_recipients::ActiveModel {
        user_id: Set(None),
        email: Set(None),
        telegram_chat_id: Set(Some(chat_id.to_string())),
        telegram_username: Set(username.map(str::to_string)),
        email_enabled: Set(false),
        telegram_enabled: Set(true),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(recipient_id = recipient.id, chat_id = %chat_id, "Created Telegram recipient");

    Ok((recipient, true))
}

pub async fn link_user(
    db: &DatabaseConnection,
    recipient: notification_recipients::Model,
    user: &users::Model,
    now: DateTime<Utc>,
) -> Result<notification_recipients::Model, DbErr> {
    let mut active = recipient.into_active_model();
    active.user_id = Set(Some(user.id));
    if let Some(email) = &user.email {
        active.email = Set(Some(email.clone()));
    }
    active.updated_at = Set(now);
    active.update(db).await
}

pub async fn set_telegram_enabled(
    db: &DatabaseConnection,
    recipient: notification_recipients::Model,
    enabled: bool,
    now: DateTime<Utc>,
) -> Result<notification_recipients::Model, DbErr> {
    let mut active = recipient.into_active_model();
    active.telegram_enabled = Set(enabled);
    if enabled {
        active.active = Set(true);
    }
    active.updated_at = Set(now);
    active.update(db).await
}

/// Case-insensitive lookup of a user by login or email
///
/// A leading `@` on the hint is ignored.
pub async fn find_user_by_login_hint(
    db: &DatabaseConnection,
    hint: &str,
) -> Result<Option<users::Model>, DbErr> {
    let hint = hint.trim().trim_start_matches('@').to_lowercase();
    if hint.is_empty() {
        return Ok(None);
    }

    Users::find()
        .filter(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(users::Column::Login))).eq(hint.clone()))
                .add(Expr::expr(Func::lower(Expr::col(users::Column::Email))).eq(hint)),
        )
        .order_by(users::Column::Id, Order::Asc)
        .one(db)
        .await
}

pub async fn find_user(db: &DatabaseConnection, user_id: i32) -> Result<Option<users::Model>, DbErr> {
    Users::find_by_id(user_id).one(db).await
}
