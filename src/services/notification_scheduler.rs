//! Notification scheduler
//!
//! One reconciliation pass over open sales and active recipients. Reminders
//! are gated by the dedup ledger per time window, so the pass can be invoked
//! as often as the external scheduler likes without duplicating messages.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::entities::{notification_recipients, sales};
use crate::services::delivery::{deliver_to_recipient, DeliveryOutcome, Notifier};
use crate::services::messages;
use crate::services::notification_ledger::{NotificationKind, NotificationLedger};
use crate::services::recipients;
use crate::services::sales::{self as sales_repo, OPEN_STATUSES};
use crate::services::time_window::{
    day_key, elapsed_business_days, pending_window_key, weekly_window, WeeklyWindow,
};

/// In-transit check-ins fire while a sale is this many business days old
pub const IN_TRANSIT_MIN_DAYS: i64 = 10;
pub const IN_TRANSIT_MAX_DAYS: i64 = 13;

/// Weekly margin split (business policy, not configurable)
pub const PARTNER_SHARE_PERCENT: u32 = 40;
pub const OWNER_SHARE_PERCENT: u32 = 60;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationScope {
    pub user_id: Option<i32>,
    #[serde(default)]
    pub force_weekly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryResult {
    pub key: String,
    pub total_margin: Decimal,
    pub partner_share: Decimal,
    pub owner_share: Decimal,
    pub sales_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRunResult {
    pub enabled: bool,
    pub sent: u32,
    pub skipped: u32,
    pub pending_sent: u32,
    pub in_transit_sent: u32,
    pub weekly_sent: u32,
    pub recipients: usize,
    pub sales: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<WeeklySummaryResult>,
}

/// 40% / 60% shares of the weekly margin, rounded to cents
pub fn weekly_shares(total_margin: Decimal) -> (Decimal, Decimal) {
    let hundred = Decimal::from(100);
    let partner = (total_margin * Decimal::from(PARTNER_SHARE_PERCENT) / hundred).round_dp(2);
    let owner = (total_margin * Decimal::from(OWNER_SHARE_PERCENT) / hundred).round_dp(2);
    (partner, owner)
}

/// Whether a sale of this age gets an in-transit check-in
pub fn in_transit_due(elapsed_days: i64) -> bool {
    (IN_TRANSIT_MIN_DAYS..=IN_TRANSIT_MAX_DAYS).contains(&elapsed_days)
}

pub struct NotificationScheduler {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    ledger: NotificationLedger,
}

impl NotificationScheduler {
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        let ledger = NotificationLedger::new(db.clone());
        Self { db, notifier, ledger }
    }

    /// Run one notification pass at `now`
    ///
    /// Only repository failures abort the pass; every per-sale/per-recipient
    /// failure is counted as skipped and the loop moves on.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        scope: NotificationScope,
    ) -> Result<NotificationRunResult, SchedulerError> {
        let mut result = NotificationRunResult {
            enabled: self.notifier.is_configured(),
            ..Default::default()
        };

        if !result.enabled {
            warn!("No notification channel configured - notification pass skipped");
            return Ok(result);
        }

        let recipients = recipients::find_deliverable(&self.db, self.notifier.email_enabled()).await?;
        let sales = sales_repo::find_by_statuses(&self.db, &OPEN_STATUSES, scope.user_id).await?;

        result.recipients = recipients.len();
        result.sales = sales.len();

        let pending_key = pending_window_key(now);
        let today_key = day_key(now);
        let week = weekly_window(now);

        info!(
            recipients = recipients.len(),
            sales = sales.len(),
            pending_key = %pending_key,
            day_key = %today_key,
            week_key = %week.key,
            user_id = ?scope.user_id,
            "Starting notification pass"
        );

        if recipients.is_empty() {
            warn!("No active recipients with a usable channel - notifications skipped");
        }

        for sale in &sales {
            for recipient in &recipients {
                let text = messages::pending_reminder(sale);
                if self
                    .send_gated(NotificationKind::Pending3h, &pending_key, sale, recipient, &text, now, &mut result)
                    .await
                {
                    result.pending_sent += 1;
                }

                let elapsed_days = elapsed_business_days(sale.created_at, now);
                if in_transit_due(elapsed_days) {
                    let text = messages::in_transit_check_in(sale, elapsed_days);
                    if self
                        .send_gated(NotificationKind::InTransit10d, &today_key, sale, recipient, &text, now, &mut result)
                        .await
                    {
                        result.in_transit_sent += 1;
                    }
                }
            }
        }

        if week.is_weekly_send_moment || scope.force_weekly {
            self.send_weekly_summary(&week, scope.user_id, &recipients, &mut result)
                .await?;
        }

        info!(
            sent = result.sent,
            skipped = result.skipped,
            pending_sent = result.pending_sent,
            in_transit_sent = result.in_transit_sent,
            weekly_sent = result.weekly_sent,
            "Notification pass complete"
        );

        Ok(result)
    }

    /// Send a fixed diagnostic message to every active recipient
    ///
    /// Bypasses the ledger entirely: always attempts, never deduplicated.
    pub async fn run_test(
        &self,
        now: DateTime<Utc>,
        user_id: Option<i32>,
    ) -> Result<NotificationRunResult, SchedulerError> {
        if !self.notifier.is_configured() {
            warn!("No notification channel configured - test notifications skipped");
            return Ok(NotificationRunResult::default());
        }

        let mut recipients = recipients::find_deliverable(&self.db, self.notifier.email_enabled()).await?;
        if let Some(user_id) = user_id {
            recipients.retain(|r| r.user_id == Some(user_id));
        }

        let mut result = NotificationRunResult {
            enabled: true,
            recipients: recipients.len(),
            ..Default::default()
        };

        let text = messages::connectivity_test(now);
        for recipient in &recipients {
            match deliver_to_recipient(self.notifier.as_ref(), recipient, &text).await {
                DeliveryOutcome::Delivered => result.sent += 1,
                _ => result.skipped += 1,
            }
        }

        info!(sent = result.sent, skipped = result.skipped, "Test notifications complete");
        Ok(result)
    }

    /// Ledger-gated delivery for one (kind, window, sale, recipient)
    ///
    /// Returns true if a message went out.
    #[allow(clippy::too_many_arguments)]
    async fn send_gated(
        &self,
        kind: NotificationKind,
        window_key: &str,
        sale: &sales::Model,
        recipient: &notification_recipients::Model,
        text: &str,
        now: DateTime<Utc>,
        result: &mut NotificationRunResult,
    ) -> bool {
        match self.ledger.was_sent(kind, window_key, sale.id, recipient.id).await {
            Ok(true) => {
                debug!(
                    kind = kind.as_str(),
                    window_key = %window_key,
                    sale_id = sale.id,
                    recipient_id = recipient.id,
                    "Already sent in this window"
                );
                result.skipped += 1;
                return false;
            }
            Ok(false) => {}
            Err(e) => {
                error!(sale_id = sale.id, recipient_id = recipient.id, error = %e, "Ledger lookup failed");
                result.skipped += 1;
                return false;
            }
        }

        match deliver_to_recipient(self.notifier.as_ref(), recipient, text).await {
            DeliveryOutcome::Delivered => {
                if let Err(e) = self
                    .ledger
                    .record_sent(kind, window_key, sale.id, recipient.id, now)
                    .await
                {
                    // The message is out; a missing ledger row only risks one resend
                    error!(
                        kind = kind.as_str(),
                        sale_id = sale.id,
                        recipient_id = recipient.id,
                        error = %e,
                        "Failed to record notification in ledger"
                    );
                }
                result.sent += 1;
                true
            }
            DeliveryOutcome::Failed(_) | DeliveryOutcome::Disabled => {
                result.skipped += 1;
                false
            }
        }
    }

    /// Broadcast the weekly margin summary to every recipient, ungated
    async fn send_weekly_summary(
        &self,
        week: &WeeklyWindow,
        user_id: Option<i32>,
        recipients: &[notification_recipients::Model],
        result: &mut NotificationRunResult,
    ) -> Result<(), SchedulerError> {
        let summary = sales_repo::margin_summary(&self.db, week.start, week.end, user_id).await?;
        let (partner_share, owner_share) = weekly_shares(summary.total_margin);

        info!(
            week_key = %week.key,
            total_margin = %summary.total_margin,
            sales_count = summary.sales_count,
            "Sending weekly summary"
        );

        let text = messages::weekly_summary(week, &summary, partner_share, owner_share);
        for recipient in recipients {
            match deliver_to_recipient(self.notifier.as_ref(), recipient, &text).await {
                DeliveryOutcome::Delivered => {
                    result.sent += 1;
                    result.weekly_sent += 1;
                }
                _ => result.skipped += 1,
            }
        }

        result.weekly = Some(WeeklySummaryResult {
            key: week.key.clone(),
            total_margin: summary.total_margin,
            partner_share,
            owner_share,
            sales_count: summary.sales_count,
        });

        Ok(())
    }
}
