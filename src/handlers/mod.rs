pub mod auth;
pub mod notifications;
pub mod sales;
pub mod telegram_webhook;
pub mod tracking;

use axum::Json;

use crate::models::common::HealthResponse;

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
