use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use tracing::warn;

use crate::{
    handlers::auth::{check_telegram_secret, internal_error, ApiError},
    models::{common::ErrorResponse, telegram::WebhookAck},
    services::telegram_webhook::{TelegramUpdate, TelegramWebhookService},
    AppState,
};

/// POST /api/telegram/webhook
///
/// The secret header is checked before the body is parsed.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    check_telegram_secret(&headers, state.config.telegram.webhook_secret.as_deref())?;

    let update: TelegramUpdate = serde_json::from_slice(&body).map_err(|e| {
        warn!("Malformed Telegram update: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Malformed Telegram update", "INVALID_UPDATE")),
        )
    })?;

    let service = TelegramWebhookService::new(state.db.clone(), state.notifier.clone());
    service
        .handle_update(&update, Utc::now())
        .await
        .map_err(|e| internal_error("Failed to handle Telegram update", e))?;

    Ok(Json(WebhookAck { ok: true }))
}
