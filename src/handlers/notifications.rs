use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;

use crate::{
    handlers::auth::{check_cron_auth, check_manual_auth, internal_error, ApiError},
    services::notification_scheduler::{NotificationRunResult, NotificationScope},
    AppState,
};

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationsQuery {
    pub user_id: Option<i32>,
}

/// GET /api/cron/notifications
pub async fn cron_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NotificationRunResult>, ApiError> {
    check_cron_auth(&headers, state.config.cron_secret.as_deref())?;
    run(&state, NotificationScope::default()).await
}

/// POST /api/notifications/run?userId=&forceWeekly=
pub async fn run_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(scope): Query<NotificationScope>,
) -> Result<Json<NotificationRunResult>, ApiError> {
    check_manual_auth(&headers, state.config.manual_trigger_secret.as_deref())?;
    tracing::info!("Manual notification run: {:?}", scope);
    run(&state, scope).await
}

/// POST /api/notifications/test?userId=
pub async fn test_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TestNotificationsQuery>,
) -> Result<Json<NotificationRunResult>, ApiError> {
    check_manual_auth(&headers, state.config.manual_trigger_secret.as_deref())?;

    state
        .scheduler()
        .run_test(Utc::now(), query.user_id)
        .await
        .map(Json)
        .map_err(|e| internal_error("Test notifications failed", e))
}

async fn run(state: &AppState, scope: NotificationScope) -> Result<Json<NotificationRunResult>, ApiError> {
    state
        .scheduler()
        .run(Utc::now(), scope)
        .await
        .map(Json)
        .map_err(|e| internal_error("Notification run failed", e))
}
