//! 17TRACK sync pass
//!
//! Loads every tracked sale, groups them by tracking number, checks the due
//! groups (most overdue first, bounded by the batch limit) and persists the
//! result. Groups are processed sequentially; a failing provider call only
//! affects its own group.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::TrackingConfig;
use crate::entities::{sales, tracking_check_logs};
use crate::services::delivery::{DeliveryOutcome, Destination, Notifier};
use crate::services::messages;
use crate::services::recipients;
use crate::services::sales as sales_repo;
use crate::services::tracking_client::{TrackingError, TrackingProvider, TrackingSnapshot};
use crate::services::tracking_state::{batch_sort_key, BatchSortKey, TrackingState};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSyncScope {
    pub user_id: Option<i32>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSyncResult {
    pub enabled: bool,
    /// Groups whose status was requested
    pub checked: u32,
    /// Groups with a successful status check
    pub updated: u32,
    pub failed: u32,
    /// Groups not due, or beyond the batch limit
    pub skipped: u32,
    /// Tracked sales loaded
    pub candidates: usize,
    /// Distinct tracking numbers among the candidates
    pub groups: usize,
    pub registered: u32,
    pub notified: u32,
}

/// All sales sharing one tracking number
struct TrackingGroup {
    tracking_number: String,
    members: Vec<sales::Model>,
    needs_registration: bool,
    sort_key: BatchSortKey,
}

pub struct TrackingSyncService {
    db: DatabaseConnection,
    provider: Arc<dyn TrackingProvider>,
    notifier: Arc<dyn Notifier>,
    config: TrackingConfig,
}

impl TrackingSyncService {
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn TrackingProvider>,
        notifier: Arc<dyn Notifier>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            db,
            provider,
            notifier,
            config,
        }
    }

    /// Run one tracking pass at `now`
    ///
    /// Only repository failures abort the pass.
    pub async fn sync(
        &self,
        now: DateTime<Utc>,
        scope: TrackingSyncScope,
    ) -> Result<TrackingSyncResult, DbErr> {
        let mut result = TrackingSyncResult {
            enabled: self.provider.is_configured(),
            ..Default::default()
        };

        if !result.enabled {
            warn!("17TRACK API key not configured - tracking sync skipped");
            return Ok(result);
        }

        let tracked = sales_repo::find_tracked(&self.db, scope.user_id).await?;
        result.candidates = tracked.len();

        let groups = self.build_groups(tracked, now, scope.force);
        result.groups = groups.total;
        result.skipped = (groups.total - groups.due.len()) as u32;

        let mut due = groups.due;
        due.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));

        let limit = self.config.batch_limit as usize;
        if due.len() > limit {
            result.skipped += (due.len() - limit) as u32;
            due.truncate(limit);
        }

        info!(
            candidates = result.candidates,
            groups = result.groups,
            due = due.len(),
            limit = limit,
            force = scope.force,
            user_id = ?scope.user_id,
            "Starting tracking sync"
        );

        for group in &due {
            self.sync_group(group, now, &mut result).await?;
        }

        info!(
            checked = result.checked,
            updated = result.updated,
            failed = result.failed,
            skipped = result.skipped,
            notified = result.notified,
            "Tracking sync complete"
        );

        Ok(result)
    }

    fn build_groups(&self, tracked: Vec<sales::Model>, now: DateTime<Utc>, force: bool) -> GroupSelection {
        let first_check_delay = self.config.first_check_delay();

        let mut by_number: BTreeMap<String, Vec<sales::Model>> = BTreeMap::new();
        for sale in tracked {
            if let Some(number) = sale.tracking_number.clone() {
                by_number.entry(number).or_default().push(sale);
            }
        }

        let total = by_number.len();
        let mut due = Vec::new();

        for (tracking_number, members) in by_number {
            let states: Vec<TrackingState> = members
                .iter()
                .map(|sale| TrackingState::from_sale(sale, first_check_delay))
                .collect();

            let sort_key = members
                .iter()
                .zip(&states)
                .filter(|(_, state)| state.is_due(now, force))
                .map(|(sale, state)| batch_sort_key(sale, state))
                .min();

            let Some(sort_key) = sort_key else {
                debug!(tracking_number = %tracking_number, "Tracking group not due");
                continue;
            };

            due.push(TrackingGroup {
                tracking_number,
                needs_registration: states.iter().any(TrackingState::needs_registration),
                members,
                sort_key,
            });
        }

        GroupSelection { total, due }
    }

    async fn sync_group(
        &self,
        group: &TrackingGroup,
        now: DateTime<Utc>,
        result: &mut TrackingSyncResult,
    ) -> Result<(), DbErr> {
        let number = group.tracking_number.as_str();

        if group.needs_registration {
            match self.provider.register(number).await {
                Ok(()) => {
                    sales_repo::mark_registered(&self.db, &group.members, now).await?;
                    result.registered += 1;
                }
                Err(e) => {
                    warn!(tracking_number = %number, error = %e, "Registration failed, checking status anyway");
                }
            }
        }

        result.checked += 1;

        match self.provider.get_status(number).await {
            Ok(snapshot) => {
                let arrived = snapshot.is_arrived();
                sales_repo::apply_check_success(
                    &self.db,
                    &group.members,
                    self.provider.provider_tag(),
                    &snapshot,
                    now,
                    self.config.recheck_delay(),
                )
                .await?;
                self.record_check(number, Ok(&snapshot), arrived, now).await?;
                result.updated += 1;

                info!(
                    tracking_number = %number,
                    sales = group.members.len(),
                    status = ?snapshot.status,
                    arrived = arrived,
                    "Tracking group updated"
                );

                result.notified += self.broadcast_update(group, &snapshot, arrived).await?;
            }
            Err(e) => {
                error!(tracking_number = %number, error = %e, "Tracking status check failed");
                sales_repo::apply_check_failure(&self.db, &group.members, now, self.config.recheck_delay())
                    .await?;
                self.record_check(number, Err(&e), false, now).await?;
                result.failed += 1;
            }
        }

        Ok(())
    }

    async fn record_check(
        &self,
        tracking_number: &str,
        outcome: Result<&TrackingSnapshot, &TrackingError>,
        arrived: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let mut row = tracking_check_logs::ActiveModel {
            tracking_number: Set(tracking_number.to_string()),
            arrived: Set(arrived),
            checked_at: Set(now),
            ..Default::default()
        };

        match outcome {
            Ok(snapshot) => {
                row.status = Set(snapshot.status.clone());
                row.substatus = Set(snapshot.substatus.clone());
                row.last_event = Set(snapshot.last_event.clone());
                row.raw_response = Set(Some(snapshot.raw.clone()));
                row.success = Set(true);
                row.error = Set(None);
            }
            Err(e) => {
                row.status = Set(None);
                row.substatus = Set(None);
                row.last_event = Set(None);
                row.raw_response = Set(None);
                row.success = Set(false);
                row.error = Set(Some(e.to_string()));
            }
        }

        row.insert(&self.db).await?;
        Ok(())
    }

    /// Send the update to every Telegram recipient; returns how many got it
    async fn broadcast_update(
        &self,
        group: &TrackingGroup,
        snapshot: &TrackingSnapshot,
        arrived: bool,
    ) -> Result<u32, DbErr> {
        let recipients = recipients::find_telegram_broadcast(&self.db).await?;
        let text = messages::tracking_update(&group.tracking_number, snapshot, arrived, &group.members);

        let mut delivered = 0;
        for recipient in &recipients {
            let Some(chat_id) = recipient.telegram_target() else {
                continue;
            };
            match self
                .notifier
                .deliver(&Destination::Telegram(chat_id.to_string()), &text)
                .await
            {
                DeliveryOutcome::Delivered => delivered += 1,
                DeliveryOutcome::Failed(reason) => {
                    warn!(recipient_id = recipient.id, reason = %reason, "Tracking update delivery failed");
                }
                DeliveryOutcome::Disabled => {}
            }
        }

        Ok(delivered)
    }
}

struct GroupSelection {
    total: usize,
    due: Vec<TrackingGroup>,
}
