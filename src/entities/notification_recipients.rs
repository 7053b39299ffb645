//! `SeaORM` Entity for notification_recipients table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_recipients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub email: Option<String>,
    #[sea_orm(unique)]
    pub telegram_chat_id: Option<String>,
    pub telegram_username: Option<String>,
    pub email_enabled: bool,
    pub telegram_enabled: bool,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Chat id usable for Telegram delivery, if the channel is switched on
    pub fn telegram_target(&self) -> Option<&str> {
        if !self.telegram_enabled {
            return None;
        }
        self.telegram_chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Email address usable for delivery, if the channel is switched on
    pub fn email_target(&self) -> Option<&str> {
        if !self.email_enabled {
            return None;
        }
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
