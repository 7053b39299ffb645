// src/lib.rs

use axum::{
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::AppConfig;
use services::{
    delivery::{DeliveryService, Notifier},
    notification_scheduler::NotificationScheduler,
    tracking_client::{Track17Client, TrackingProvider},
    tracking_sync::TrackingSyncService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub notifier: Arc<dyn Notifier>,
    pub tracking: Arc<dyn TrackingProvider>,
}

impl AppState {
    /// Wire the production Telegram/SMTP notifier and 17TRACK client
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(DeliveryService::from_config(&config));
        let tracking: Arc<dyn TrackingProvider> =
            Arc::new(Track17Client::new(&config.tracking, config.outbound_timeout));

        Self {
            db,
            config: Arc::new(config),
            notifier,
            tracking,
        }
    }

    pub fn scheduler(&self) -> NotificationScheduler {
        NotificationScheduler::new(self.db.clone(), self.notifier.clone())
    }

    pub fn tracking_sync(&self) -> TrackingSyncService {
        TrackingSyncService::new(
            self.db.clone(),
            self.tracking.clone(),
            self.notifier.clone(),
            self.config.tracking.clone(),
        )
    }
}

pub mod config;

pub mod entities {
    pub mod prelude;
    pub mod notification_logs;
    pub mod notification_recipients;
    pub mod sales;
    pub mod tracking_check_logs;
    pub mod users;
}

pub mod services {
    pub mod delivery;
    pub mod email;
    pub mod messages;
    pub mod notification_ledger;
    pub mod notification_scheduler;
    pub mod recipients;
    pub mod sales;
    pub mod telegram;
    pub mod telegram_webhook;
    pub mod time_window;
    pub mod tracking_client;
    pub mod tracking_state;
    pub mod tracking_sync;
}

pub mod models;
pub mod handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/cron/notifications", get(handlers::notifications::cron_notifications))
        .route("/api/cron/tracking", get(handlers::tracking::cron_tracking))
        .route("/api/notifications/run", post(handlers::notifications::run_notifications))
        .route("/api/notifications/test", post(handlers::notifications::test_notifications))
        .route("/api/tracking/sync", post(handlers::tracking::sync_tracking))
        .route("/api/sales/{id}/tracking", patch(handlers::sales::update_tracking))
        .route("/api/sales/{id}/status", patch(handlers::sales::update_status))
        .route("/api/telegram/webhook", post(handlers::telegram_webhook::telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
