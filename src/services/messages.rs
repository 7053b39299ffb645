//! Message composition for Telegram/email notifications

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::entities::sales;
use crate::services::sales::MarginSummary;
use crate::services::time_window::{to_business_local, WeeklyWindow};
use crate::services::tracking_client::TrackingSnapshot;

const DASH: &str = "-";

fn or_dash(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(DASH)
}

fn local_stamp(instant: DateTime<Utc>) -> String {
    to_business_local(instant).format("%Y-%m-%d %H:%M").to_string()
}

pub fn pending_reminder(sale: &sales::Model) -> String {
    format!(
        "⏰ Sale needs attention\n\
         Status: {}\n\
         Client: {}\n\
         Phone: {}\n\
         Product: {} x{}\n\
         Sale #{}",
        sale.status,
        sale.client_name,
        or_dash(sale.client_phone.as_deref()),
        sale.product_name,
        sale.quantity,
        sale.id
    )
}

pub fn in_transit_check_in(sale: &sales::Model, elapsed_days: i64) -> String {
    format!(
        "🚚 Order in transit for {} days\n\
         Client: {}\n\
         Phone: {}\n\
         Product: {}\n\
         Tracking: {} ({})\n\
         Sale #{}",
        elapsed_days,
        sale.client_name,
        or_dash(sale.client_phone.as_deref()),
        sale.product_name,
        or_dash(sale.tracking_number.as_deref()),
        or_dash(sale.tracking_status.as_deref()),
        sale.id
    )
}

pub fn weekly_summary(
    window: &WeeklyWindow,
    summary: &MarginSummary,
    partner_share: Decimal,
    owner_share: Decimal,
) -> String {
    format!(
        "📊 Weekly summary {}\n\
         Period: {} - {}\n\
         Sales: {} (TODO {}, DONE {}, WAITING {})\n\
         Total margin: {}\n\
         Partner share (40%): {}\n\
         Owner share (60%): {}",
        window.key,
        local_stamp(window.start),
        local_stamp(window.end),
        summary.sales_count,
        summary.todo_count,
        summary.done_count,
        summary.waiting_count,
        summary.total_margin.round_dp(2),
        partner_share,
        owner_share
    )
}

pub fn tracking_update(
    tracking_number: &str,
    snapshot: &TrackingSnapshot,
    arrived: bool,
    group: &[sales::Model],
) -> String {
    let headline = if arrived {
        "✅ Shipment arrived"
    } else {
        "📦 Shipment update"
    };

    let orders = group
        .iter()
        .map(|sale| format!("#{} {} ({})", sale.id, sale.client_name, sale.product_name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\
         Tracking: {}\n\
         Status: {}\n\
         Substatus: {}\n\
         Last event: {}\n\
         Orders:\n{}",
        headline,
        tracking_number,
        or_dash(snapshot.status.as_deref()),
        or_dash(snapshot.substatus.as_deref()),
        or_dash(snapshot.last_event.as_deref()),
        orders
    )
}

pub fn connectivity_test(now: DateTime<Utc>) -> String {
    format!(
        "🔔 Test notification from the sales tracker ({}). If you see this, delivery works.",
        local_stamp(now)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sale() -> sales::Model {
        let now = Utc::now();
        sales::Model {
            id: 12,
            user_id: None,
            client_name: "Aziz".to_string(),
            client_phone: None,
            product_name: "Headphones".to_string(),
            quantity: 2,
            cost_price: dec!(10),
            cost_currency: "CNY".to_string(),
            sale_price: dec!(50),
            margin: dec!(30),
            status: "TODO".to_string(),
            tracking_number: Some("LX123".to_string()),
            tracking_provider: None,
            tracking_status: None,
            tracking_substatus: None,
            tracking_last_event: None,
            tracking_raw: None,
            tracking_synced_at: None,
            tracking_registered_at: None,
            tracking_next_check_at: None,
            tracking_arrived_at: None,
            tracking_last_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pending_reminder_tolerates_missing_phone() {
        let text = pending_reminder(&sale());
        assert!(text.contains("Status: TODO"));
        assert!(text.contains("Client: Aziz"));
        assert!(text.contains("Phone: -"));
        assert!(text.contains("Sale #12"));
    }

    #[test]
    fn test_tracking_update_lists_every_order() {
        let mut second = sale();
        second.id = 13;
        let snapshot = TrackingSnapshot {
            status: Some("InTransit".to_string()),
            substatus: None,
            last_event: Some("Departed".to_string()),
            raw: serde_json::Value::Null,
        };
        let text = tracking_update("LX123", &snapshot, false, &[sale(), second]);
        assert!(text.contains("#12 Aziz"));
        assert!(text.contains("#13 Aziz"));
        assert!(text.contains("Substatus: -"));
    }
}
