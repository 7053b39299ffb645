//! Sales repository
//!
//! The queries and patches the notification scheduler and tracking sync need
//! from the `sales` table. Sale creation and editing live in the CRUD layer.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    Order, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::entities::{prelude::Sales, sales};
use crate::services::tracking_client::TrackingSnapshot;

/// Lifecycle status of a sale. `Waiting` is the soft-trash state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaleStatus {
    Todo,
    Done,
    Waiting,
}

/// Statuses the notification scheduler treats as open
pub const OPEN_STATUSES: [SaleStatus; 2] = [SaleStatus::Todo, SaleStatus::Waiting];

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Todo => "TODO",
            SaleStatus::Done => "DONE",
            SaleStatus::Waiting => "WAITING",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TODO" => Ok(SaleStatus::Todo),
            "DONE" => Ok(SaleStatus::Done),
            "WAITING" => Ok(SaleStatus::Waiting),
            other => Err(format!("Unknown sale status '{}'. Expected TODO, DONE or WAITING", other)),
        }
    }
}

/// Canonical form of a tracking number: no whitespace, upper case
///
/// Returns `None` for empty input so "clear tracking" and "no tracking" are
/// the same thing.
pub fn normalize_tracking_number(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub async fn find_by_statuses(
    db: &DatabaseConnection,
    statuses: &[SaleStatus],
    user_id: Option<i32>,
) -> Result<Vec<sales::Model>, DbErr> {
    let mut query = Sales::find().filter(
        sales::Column::Status.is_in(statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
    );

    if let Some(user_id) = user_id {
        query = query.filter(sales::Column::UserId.eq(user_id));
    }

    query
        .order_by(sales::Column::CreatedAt, Order::Asc)
        .order_by(sales::Column::Id, Order::Asc)
        .all(db)
        .await
}

/// Sales carrying a tracking number, any status
pub async fn find_tracked(
    db: &DatabaseConnection,
    user_id: Option<i32>,
) -> Result<Vec<sales::Model>, DbErr> {
    let mut query = Sales::find().filter(
        Condition::all()
            .add(sales::Column::TrackingNumber.is_not_null())
            .add(sales::Column::TrackingNumber.ne("")),
    );

    if let Some(user_id) = user_id {
        query = query.filter(sales::Column::UserId.eq(user_id));
    }

    query.order_by(sales::Column::Id, Order::Asc).all(db).await
}

pub async fn find_created_between(
    db: &DatabaseConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    user_id: Option<i32>,
) -> Result<Vec<sales::Model>, DbErr> {
    let mut query = Sales::find()
        .filter(sales::Column::CreatedAt.gte(start))
        .filter(sales::Column::CreatedAt.lte(end));

    if let Some(user_id) = user_id {
        query = query.filter(sales::Column::UserId.eq(user_id));
    }

    query.order_by(sales::Column::CreatedAt, Order::Asc).all(db).await
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub total_margin: Decimal,
    pub sales_count: usize,
    pub todo_count: usize,
    pub done_count: usize,
    pub waiting_count: usize,
}

/// Total margin and per-status counts for sales created in `[start, end]`
pub async fn margin_summary(
    db: &DatabaseConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    user_id: Option<i32>,
) -> Result<MarginSummary, DbErr> {
    let sales = find_created_between(db, start, end, user_id).await?;
    Ok(summarize(&sales))
}

fn summarize(sales: &[sales::Model]) -> MarginSummary {
    let mut summary = MarginSummary::default();

    for sale in sales {
        summary.total_margin += sale.margin;
        summary.sales_count += 1;
        match sale.status.parse::<SaleStatus>() {
            Ok(SaleStatus::Todo) => summary.todo_count += 1,
            Ok(SaleStatus::Done) => summary.done_count += 1,
            Ok(SaleStatus::Waiting) => summary.waiting_count += 1,
            Err(_) => {}
        }
    }

    summary
}

/// Change a sale's tracking number
///
/// A different number resets every tracking field to fresh and starts a new
/// first-check countdown; the same number (after normalization) is a no-op.
/// An empty number clears tracking entirely. Returns `None` if the sale does
/// not exist.
pub async fn set_tracking_number(
    db: &DatabaseConnection,
    sale_id: i32,
    raw_number: Option<&str>,
    now: DateTime<Utc>,
    first_check_delay: Duration,
) -> Result<Option<sales::Model>, DbErr> {
    let Some(sale) = Sales::find_by_id(sale_id).one(db).await? else {
        return Ok(None);
    };

    let number = raw_number.and_then(normalize_tracking_number);

    if number == sale.tracking_number {
        return Ok(Some(sale));
    }

    tracing::info!(
        sale_id = sale_id,
        old = ?sale.tracking_number,
        new = ?number,
        "Tracking number changed, resetting tracking state"
    );

    let next_check_at = number.as_ref().map(|_| now + first_check_delay);

    let mut active = sale.into_active_model();
    active.tracking_number = Set(number);
    active.tracking_provider = Set(None);
    active.tracking_status = Set(None);
    active.tracking_substatus = Set(None);
    active.tracking_last_event = Set(None);
    active.tracking_raw = Set(None);
    active.tracking_synced_at = Set(None);
    active.tracking_registered_at = Set(None);
    active.tracking_next_check_at = Set(next_check_at);
    active.tracking_arrived_at = Set(None);
    active.tracking_last_changed_at = Set(Some(now));
    active.updated_at = Set(now);

    active.update(db).await.map(Some)
}

pub async fn set_status(
    db: &DatabaseConnection,
    sale_id: i32,
    status: SaleStatus,
    now: DateTime<Utc>,
) -> Result<Option<sales::Model>, DbErr> {
    let Some(sale) = Sales::find_by_id(sale_id).one(db).await? else {
        return Ok(None);
    };

    if sale.status == status.as_str() {
        return Ok(Some(sale));
    }

    tracing::info!(sale_id = sale_id, from = %sale.status, to = %status, "Sale status changed");

    let mut active = sale.into_active_model();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(now);
    active.update(db).await.map(Some)
}

fn group_ids(group: &[sales::Model]) -> Vec<i32> {
    group.iter().map(|sale| sale.id).collect()
}

/// Stamp a tracking group as registered with the provider
pub async fn mark_registered(
    db: &DatabaseConnection,
    group: &[sales::Model],
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    Sales::update_many()
        .col_expr(sales::Column::TrackingRegisteredAt, Expr::value(now))
        .filter(sales::Column::Id.is_in(group_ids(group)))
        .exec(db)
        .await?;
    Ok(())
}

/// Whether a snapshot carries information the stored row does not have
fn tracking_changed(sale: &sales::Model, provider: &str, snapshot: &TrackingSnapshot) -> bool {
    sale.tracking_provider.as_deref() != Some(provider)
        || sale.tracking_status != snapshot.status
        || sale.tracking_substatus != snapshot.substatus
        || sale.tracking_last_event != snapshot.last_event
}

/// Persist a successful status check on every sale of a tracking group
///
/// Arrived sales stop polling (`next_check_at` null) and keep their first
/// arrival time. `last_changed_at` only moves when the provider reported
/// something new.
pub async fn apply_check_success(
    db: &DatabaseConnection,
    group: &[sales::Model],
    provider: &str,
    snapshot: &TrackingSnapshot,
    now: DateTime<Utc>,
    recheck_delay: Duration,
) -> Result<(), DbErr> {
    let arrived = snapshot.is_arrived();

    for sale in group {
        let changed = tracking_changed(sale, provider, snapshot);
        let arrived_at = sale.tracking_arrived_at.or(arrived.then_some(now));
        let next_check_at = match arrived_at {
            Some(_) => None,
            None => Some(now + recheck_delay),
        };

        let mut active = sale.clone().into_active_model();
        active.tracking_provider = Set(Some(provider.to_string()));
        active.tracking_status = Set(snapshot.status.clone());
        active.tracking_substatus = Set(snapshot.substatus.clone());
        active.tracking_last_event = Set(snapshot.last_event.clone());
        active.tracking_raw = Set(Some(snapshot.raw.clone()));
        active.tracking_synced_at = Set(Some(now));
        active.tracking_next_check_at = Set(next_check_at);
        active.tracking_arrived_at = Set(arrived_at);
        if changed {
            active.tracking_last_changed_at = Set(Some(now));
        }
        active.updated_at = Set(now);
        active.update(db).await?;
    }

    Ok(())
}

/// Persist a failed status check: back off by the recheck delay, keep status fields
pub async fn apply_check_failure(
    db: &DatabaseConnection,
    group: &[sales::Model],
    now: DateTime<Utc>,
    recheck_delay: Duration,
) -> Result<(), DbErr> {
    Sales::update_many()
        .col_expr(sales::Column::TrackingSyncedAt, Expr::value(now))
        .col_expr(sales::Column::TrackingNextCheckAt, Expr::value(now + recheck_delay))
        .col_expr(sales::Column::UpdatedAt, Expr::value(now))
        .filter(sales::Column::Id.is_in(group_ids(group)))
        .exec(db)
        .await?;
    Ok(())
}
