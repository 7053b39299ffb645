//! Notification dedup ledger
//!
//! A row in `notification_logs` means "this (kind, window, sale, recipient)
//! notification was delivered, do not resend". Rows are append-only.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::entities::{notification_logs, prelude::NotificationLogs};

/// Kinds of ledger-gated notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// "Needs attention" reminder, once per 3-hour block
    Pending3h,
    /// In-transit check-in, once per day while 10-13 days old
    InTransit10d,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Pending3h => "PENDING_3H",
            NotificationKind::InTransit10d => "IN_TRANSIT_10D",
        }
    }
}

#[derive(Clone)]
pub struct NotificationLedger {
    db: DatabaseConnection,
}

impl NotificationLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn was_sent(
        &self,
        kind: NotificationKind,
        window_key: &str,
        sale_id: i32,
        recipient_id: i32,
    ) -> Result<bool, DbErr> {
        let count = NotificationLogs::find()
            .filter(notification_logs::Column::Kind.eq(kind.as_str()))
            .filter(notification_logs::Column::WindowKey.eq(window_key))
            .filter(notification_logs::Column::SaleId.eq(sale_id))
            .filter(notification_logs::Column::RecipientId.eq(recipient_id))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Record a successful send
    ///
    /// Only call after the delivery adapter reported success. Re-recording the
    /// same key is a no-op (unique index + ON CONFLICT DO NOTHING); returns
    /// whether a new row was written.
    pub async fn record_sent(
        &self,
        kind: NotificationKind,
        window_key: &str,
        sale_id: i32,
        recipient_id: i32,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let entry = notification_logs::ActiveModel {
            kind: Set(kind.as_str().to_string()),
            window_key: Set(window_key.to_string()),
            sale_id: Set(sale_id),
            recipient_id: Set(recipient_id),
            sent_at: Set(sent_at),
            ..Default::default()
        };

        let inserted = NotificationLogs::insert(entry)
            .on_conflict(
                OnConflict::columns([
                    notification_logs::Column::Kind,
                    notification_logs::Column::WindowKey,
                    notification_logs::Column::SaleId,
                    notification_logs::Column::RecipientId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        if inserted == 0 {
            tracing::debug!(
                kind = kind.as_str(),
                window_key = %window_key,
                sale_id = sale_id,
                recipient_id = recipient_id,
                "Ledger entry already present"
            );
        }

        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(NotificationKind::Pending3h.as_str(), "PENDING_3H");
        assert_eq!(NotificationKind::InTransit10d.as_str(), "IN_TRANSIT_10D");
    }
}
