use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::sales;

/// PATCH /api/sales/{id}/tracking
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrackingRequest {
    /// Null or empty clears tracking
    pub tracking_number: Option<String>,
}

/// PATCH /api/sales/{id}/status
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleTrackingResponse {
    pub id: i32,
    pub status: String,
    pub tracking_number: Option<String>,
    pub tracking_provider: Option<String>,
    pub tracking_status: Option<String>,
    pub tracking_substatus: Option<String>,
    pub tracking_last_event: Option<String>,
    pub tracking_synced_at: Option<DateTime<Utc>>,
    pub tracking_next_check_at: Option<DateTime<Utc>>,
    pub tracking_arrived_at: Option<DateTime<Utc>>,
    pub tracking_last_changed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<sales::Model> for SaleTrackingResponse {
    fn from(sale: sales::Model) -> Self {
        Self {
            id: sale.id,
            status: sale.status,
            tracking_number: sale.tracking_number,
            tracking_provider: sale.tracking_provider,
            tracking_status: sale.tracking_status,
            tracking_substatus: sale.tracking_substatus,
            tracking_last_event: sale.tracking_last_event,
            tracking_synced_at: sale.tracking_synced_at,
            tracking_next_check_at: sale.tracking_next_check_at,
            tracking_arrived_at: sale.tracking_arrived_at,
            tracking_last_changed_at: sale.tracking_last_changed_at,
            updated_at: sale.updated_at,
        }
    }
}
