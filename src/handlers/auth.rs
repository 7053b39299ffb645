use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use tracing::{error, warn};

use crate::models::common::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

const MANUAL_KEY_HEADER: &str = "x-api-key";
pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

fn config_error(name: &str) -> ApiError {
    error!("{} not configured", name);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Server configuration error", "CONFIG_ERROR")),
    )
}

fn unauthorized(message: &str) -> ApiError {
    warn!("{}", message);
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message, "UNAUTHORIZED")),
    )
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

/// `x-api-key` must equal the manual-trigger secret
pub fn check_manual_auth(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let secret = secret.ok_or_else(|| config_error("MANUAL_TRIGGER_SECRET"))?;

    if header_value(headers, MANUAL_KEY_HEADER) != secret {
        return Err(unauthorized("Invalid or missing API key"));
    }
    Ok(())
}

/// `Authorization: Bearer <secret>` from the external scheduler
pub fn check_cron_auth(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let secret = secret.ok_or_else(|| config_error("CRON_SECRET"))?;

    let provided = header_value(headers, AUTHORIZATION.as_str())
        .strip_prefix("Bearer ")
        .unwrap_or("");

    if provided != secret {
        return Err(unauthorized("Invalid or missing cron secret"));
    }
    Ok(())
}

/// Telegram echoes the secret configured with setWebhook
pub fn check_telegram_secret(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let secret = secret.ok_or_else(|| config_error("TELEGRAM_WEBHOOK_SECRET"))?;

    if header_value(headers, TELEGRAM_SECRET_HEADER) != secret {
        return Err(unauthorized("Invalid webhook secret"));
    }
    Ok(())
}

pub fn internal_error(context: &str, e: impl std::fmt::Display) -> ApiError {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(context, "DATABASE_ERROR")),
    )
}
