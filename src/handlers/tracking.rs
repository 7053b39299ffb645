use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;

use crate::{
    handlers::auth::{check_cron_auth, check_manual_auth, internal_error, ApiError},
    services::tracking_sync::{TrackingSyncResult, TrackingSyncScope},
    AppState,
};

/// GET /api/cron/tracking
pub async fn cron_tracking(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TrackingSyncResult>, ApiError> {
    check_cron_auth(&headers, state.config.cron_secret.as_deref())?;
    sync(&state, TrackingSyncScope::default()).await
}

/// POST /api/tracking/sync?userId=&force=
pub async fn sync_tracking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(scope): Query<TrackingSyncScope>,
) -> Result<Json<TrackingSyncResult>, ApiError> {
    check_manual_auth(&headers, state.config.manual_trigger_secret.as_deref())?;
    tracing::info!("Manual tracking sync: {:?}", scope);
    sync(&state, scope).await
}

async fn sync(state: &AppState, scope: TrackingSyncScope) -> Result<Json<TrackingSyncResult>, ApiError> {
    state
        .tracking_sync()
        .sync(Utc::now(), scope)
        .await
        .map(Json)
        .map_err(|e| internal_error("Tracking sync failed", e))
}
