#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;
use std::collections::HashMap;
use std::sync::Mutex;

use sales_tracker_backend::entities::{notification_recipients, sales, users};
use sales_tracker_backend::services::delivery::{DeliveryOutcome, Destination, Notifier};
use sales_tracker_backend::services::time_window::BUSINESS_UTC_OFFSET_SECS;
use sales_tracker_backend::services::tracking_client::{
    TrackingError, TrackingProvider, TrackingSnapshot,
};

/// Fresh in-memory SQLite database with every migration applied
///
/// A single pooled connection keeps the in-memory database alive for the
/// whole test.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Business-local (UTC+5) wall clock time as a UTC instant
pub fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    FixedOffset::east_opt(BUSINESS_UTC_OFFSET_SECS)
        .unwrap()
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub async fn seed_user(db: &DatabaseConnection, login: &str, email: Option<&str>) -> users::Model {
    users::ActiveModel {
        login: Set(login.to_string()),
        email: Set(email.map(str::to_string)),
        display_name: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub struct SaleSeed<'a> {
    pub client_name: &'a str,
    pub status: &'a str,
    pub margin: Decimal,
    pub user_id: Option<i32>,
    pub tracking_number: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

impl<'a> SaleSeed<'a> {
    pub fn new(client_name: &'a str, created_at: DateTime<Utc>) -> Self {
        Self {
            client_name,
            status: "TODO",
            margin: Decimal::ZERO,
            user_id: None,
            tracking_number: None,
            created_at,
        }
    }
}

pub async fn seed_sale(db: &DatabaseConnection, seed: SaleSeed<'_>) -> sales::Model {
    sales::ActiveModel {
        user_id: Set(seed.user_id),
        client_name: Set(seed.client_name.to_string()),
        client_phone: Set(None),
        product_name: Set("Wireless earbuds".to_string()),
        quantity: Set(1),
        cost_price: Set(Decimal::ZERO),
        cost_currency: Set("CNY".to_string()),
        sale_price: Set(seed.margin),
        margin: Set(seed.margin),
        status: Set(seed.status.to_string()),
        tracking_number: Set(seed.tracking_number.map(str::to_string)),
        tracking_provider: Set(None),
        tracking_status: Set(None),
        tracking_substatus: Set(None),
        tracking_last_event: Set(None),
        tracking_raw: Set(None),
        tracking_synced_at: Set(None),
        tracking_registered_at: Set(None),
        tracking_next_check_at: Set(None),
        tracking_arrived_at: Set(None),
        tracking_last_changed_at: Set(None),
        created_at: Set(seed.created_at),
        updated_at: Set(seed.created_at),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_telegram_recipient(
    db: &DatabaseConnection,
    chat_id: &str,
    user_id: Option<i32>,
) -> notification_recipients::Model {
    notification_recipients::ActiveModel {
        user_id: Set(user_id),
        email: Set(None),
        telegram_chat_id: Set(Some(chat_id.to_string())),
        telegram_username: Set(None),
        email_enabled: Set(false),
        telegram_enabled: Set(true),
        active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Notifier that records every message and can fail selected chats
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Destination, String)>>,
    pub failing_chats: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn fail_chat(&self, chat_id: &str) {
        self.failing_chats.lock().unwrap().push(chat_id.to_string());
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, destination: &Destination, text: &str) -> DeliveryOutcome {
        if let Destination::Telegram(chat_id) = destination {
            if self.failing_chats.lock().unwrap().contains(chat_id) {
                return DeliveryOutcome::Failed("chat unreachable".to_string());
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.clone(), text.to_string()));
        DeliveryOutcome::Delivered
    }

    fn email_enabled(&self) -> bool {
        false
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Scripted tracking provider
///
/// Numbers without a scripted answer return an empty in-transit snapshot.
#[derive(Default)]
pub struct FakeTracker {
    pub responses: Mutex<HashMap<String, Result<TrackingSnapshot, String>>>,
    pub register_calls: Mutex<Vec<String>>,
    pub status_calls: Mutex<Vec<String>>,
    pub fail_register: bool,
}

impl FakeTracker {
    pub fn respond(&self, number: &str, status: &str, last_event: &str) {
        let snapshot = TrackingSnapshot {
            status: Some(status.to_string()),
            substatus: None,
            last_event: Some(last_event.to_string()),
            raw: serde_json::json!({ "status": status, "lastEvent": last_event }),
        };
        self.responses
            .lock()
            .unwrap()
            .insert(number.to_string(), Ok(snapshot));
    }

    pub fn fail(&self, number: &str, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(number.to_string(), Err(reason.to_string()));
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn register_calls(&self) -> Vec<String> {
        self.register_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackingProvider for FakeTracker {
    fn is_configured(&self) -> bool {
        true
    }

    fn provider_tag(&self) -> &'static str {
        "17track"
    }

    async fn register(&self, tracking_number: &str) -> Result<(), TrackingError> {
        self.register_calls
            .lock()
            .unwrap()
            .push(tracking_number.to_string());
        if self.fail_register {
            return Err(TrackingError::Rejected("already registered".to_string()));
        }
        Ok(())
    }

    async fn get_status(&self, tracking_number: &str) -> Result<TrackingSnapshot, TrackingError> {
        self.status_calls
            .lock()
            .unwrap()
            .push(tracking_number.to_string());

        match self.responses.lock().unwrap().get(tracking_number) {
            Some(Ok(snapshot)) => Ok(snapshot.clone()),
            Some(Err(reason)) => Err(TrackingError::Http {
                status: 503,
                body: reason.clone(),
            }),
            None => Ok(TrackingSnapshot {
                status: Some("InTransit".to_string()),
                substatus: None,
                last_event: None,
                raw: serde_json::json!({}),
            }),
        }
    }
}
