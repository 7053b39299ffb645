use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit of every provider call, never read by the sync itself
        manager
            .create_table(
                Table::create()
                    .table(TrackingCheckLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(TrackingCheckLogs::Id))
                    .col(string(TrackingCheckLogs::TrackingNumber))
                    .col(string_null(TrackingCheckLogs::Status))
                    .col(string_null(TrackingCheckLogs::Substatus))
                    .col(text_null(TrackingCheckLogs::LastEvent))
                    .col(boolean(TrackingCheckLogs::Arrived).default(false))
                    .col(boolean(TrackingCheckLogs::Success).default(false))
                    .col(json_null(TrackingCheckLogs::RawResponse))
                    .col(text_null(TrackingCheckLogs::Error))
                    .col(
                        timestamp_with_time_zone(TrackingCheckLogs::CheckedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracking_check_logs_number")
                    .table(TrackingCheckLogs::Table)
                    .col(TrackingCheckLogs::TrackingNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackingCheckLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TrackingCheckLogs {
    Table,
    Id,
    TrackingNumber,
    Status,
    Substatus,
    LastEvent,
    Arrived,
    Success,
    RawResponse,
    Error,
    CheckedAt,
}
