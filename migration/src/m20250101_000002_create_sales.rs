//! Sales table with the shipment tracking columns maintained by the 17TRACK sync

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sales::Table)
                    .if_not_exists()
                    .col(pk_auto(Sales::Id))
                    .col(integer_null(Sales::UserId))
                    .col(string(Sales::ClientName))
                    .col(string_null(Sales::ClientPhone))
                    .col(string(Sales::ProductName))
                    .col(integer(Sales::Quantity).default(1))
                    .col(decimal_len(Sales::CostPrice, 14, 2).default(0))
                    .col(string_len(Sales::CostCurrency, 8).default("CNY"))
                    .col(decimal_len(Sales::SalePrice, 14, 2).default(0))
                    .col(decimal_len(Sales::Margin, 14, 2).default(0))
                    .col(string_len(Sales::Status, 16).default("TODO"))
                    .col(string_null(Sales::TrackingNumber))
                    .col(string_null(Sales::TrackingProvider))
                    .col(string_null(Sales::TrackingStatus))
                    .col(string_null(Sales::TrackingSubstatus))
                    .col(text_null(Sales::TrackingLastEvent))
                    .col(json_null(Sales::TrackingRaw))
                    .col(timestamp_with_time_zone_null(Sales::TrackingSyncedAt))
                    .col(timestamp_with_time_zone_null(Sales::TrackingRegisteredAt))
                    .col(timestamp_with_time_zone_null(Sales::TrackingNextCheckAt))
                    .col(timestamp_with_time_zone_null(Sales::TrackingArrivedAt))
                    .col(timestamp_with_time_zone_null(Sales::TrackingLastChangedAt))
                    .col(timestamp_with_time_zone(Sales::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Sales::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Open-sales scan used by the notification scheduler
        manager
            .create_index(
                Index::create()
                    .name("idx_sales_status_user")
                    .table(Sales::Table)
                    .col(Sales::Status)
                    .col(Sales::UserId)
                    .to_owned(),
            )
            .await?;

        // Tracking groups are looked up by number
        manager
            .create_index(
                Index::create()
                    .name("idx_sales_tracking_number")
                    .table(Sales::Table)
                    .col(Sales::TrackingNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sales_tracking_next_check_at")
                    .table(Sales::Table)
                    .col(Sales::TrackingNextCheckAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sales::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sales {
    Table,
    Id,
    UserId,
    ClientName,
    ClientPhone,
    ProductName,
    Quantity,
    CostPrice,
    CostCurrency,
    SalePrice,
    Margin,
    Status,
    TrackingNumber,
    TrackingProvider,
    TrackingStatus,
    TrackingSubstatus,
    TrackingLastEvent,
    TrackingRaw,
    TrackingSyncedAt,
    TrackingRegisteredAt,
    TrackingNextCheckAt,
    TrackingArrivedAt,
    TrackingLastChangedAt,
    CreatedAt,
    UpdatedAt,
}
