//! Dedup ledger: one row per successfully delivered (kind, window, sale, recipient)

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(NotificationLogs::Id))
                    .col(string_len(NotificationLogs::Kind, 32))
                    .col(string_len(NotificationLogs::WindowKey, 64))
                    .col(integer(NotificationLogs::SaleId))
                    .col(integer(NotificationLogs::RecipientId))
                    .col(
                        timestamp_with_time_zone(NotificationLogs::SentAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_logs_dedup")
                    .table(NotificationLogs::Table)
                    .col(NotificationLogs::Kind)
                    .col(NotificationLogs::WindowKey)
                    .col(NotificationLogs::SaleId)
                    .col(NotificationLogs::RecipientId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationLogs {
    Table,
    Id,
    Kind,
    WindowKey,
    SaleId,
    RecipientId,
    SentAt,
}
