//! Per-sale tracking state derived from the stored tracking columns
//!
//! The sync engine never inspects the nullable columns directly; it derives a
//! [`TrackingState`] and asks it whether the sale is due.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;

use crate::entities::sales;
use crate::services::tracking_client::looks_delivered;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// Never registered with the provider
    Fresh { due_at: DateTime<Utc> },
    /// Registered, no status fetched yet
    Registered { due_at: DateTime<Utc> },
    /// Checked at least once, waiting for the next recheck
    AwaitingCheck { due_at: DateTime<Utc> },
    /// Reached the destination country or was delivered; terminal
    Arrived { at: DateTime<Utc> },
}

impl TrackingState {
    /// Derive the state of one sale
    ///
    /// A missing next-check timestamp falls back to `created_at +
    /// first_check_delay`.
    pub fn from_sale(sale: &sales::Model, first_check_delay: Duration) -> Self {
        if let Some(at) = sale.tracking_arrived_at {
            return TrackingState::Arrived { at };
        }

        if looks_delivered(sale.tracking_status.as_deref(), sale.tracking_substatus.as_deref()) {
            let at = sale.tracking_synced_at.unwrap_or(sale.updated_at);
            return TrackingState::Arrived { at };
        }

        let due_at = sale
            .tracking_next_check_at
            .unwrap_or_else(|| sale.created_at + first_check_delay);

        match (sale.tracking_registered_at, sale.tracking_synced_at) {
            (None, _) => TrackingState::Fresh { due_at },
            (Some(_), None) => TrackingState::Registered { due_at },
            (Some(_), Some(_)) => TrackingState::AwaitingCheck { due_at },
        }
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TrackingState::Fresh { due_at }
            | TrackingState::Registered { due_at }
            | TrackingState::AwaitingCheck { due_at } => Some(*due_at),
            TrackingState::Arrived { .. } => None,
        }
    }

    /// `force` bypasses both the due date and the terminal state
    pub fn is_due(&self, now: DateTime<Utc>, force: bool) -> bool {
        if force {
            return true;
        }
        self.due_at().is_some_and(|due_at| due_at <= now)
    }

    pub fn needs_registration(&self) -> bool {
        matches!(self, TrackingState::Fresh { .. })
    }

    pub fn is_arrived(&self) -> bool {
        matches!(self, TrackingState::Arrived { .. })
    }
}

/// Batch ordering: most overdue first, never-synced before synced, newest sale first
pub type BatchSortKey = (DateTime<Utc>, Option<DateTime<Utc>>, Reverse<DateTime<Utc>>);

pub fn batch_sort_key(sale: &sales::Model, state: &TrackingState) -> BatchSortKey {
    let due = match state {
        TrackingState::Arrived { at } => *at,
        other => other.due_at().unwrap_or(sale.created_at),
    };
    (due, sale.tracking_synced_at, Reverse(sale.created_at))
}
