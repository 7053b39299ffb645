use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationRecipients::Table)
                    .if_not_exists()
                    .col(pk_auto(NotificationRecipients::Id))
                    .col(integer_null(NotificationRecipients::UserId))
                    .col(string_null(NotificationRecipients::Email))
                    .col(string_null(NotificationRecipients::TelegramChatId))
                    .col(string_null(NotificationRecipients::TelegramUsername))
                    .col(boolean(NotificationRecipients::EmailEnabled).default(false))
                    .col(boolean(NotificationRecipients::TelegramEnabled).default(true))
                    .col(boolean(NotificationRecipients::Active).default(true))
                    .col(
                        timestamp_with_time_zone(NotificationRecipients::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(NotificationRecipients::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One recipient row per Telegram chat
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_recipients_chat_id")
                    .table(NotificationRecipients::Table)
                    .col(NotificationRecipients::TelegramChatId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationRecipients::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationRecipients {
    Table,
    Id,
    UserId,
    Email,
    TelegramChatId,
    TelegramUsername,
    EmailEnabled,
    TelegramEnabled,
    Active,
    CreatedAt,
    UpdatedAt,
}
