use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;

use crate::{
    handlers::auth::{check_manual_auth, internal_error, ApiError},
    models::{
        common::ErrorResponse,
        sales::{SaleTrackingResponse, UpdateStatusRequest, UpdateTrackingRequest},
    },
    services::sales::{self as sales_repo, SaleStatus},
    AppState,
};

fn not_found(sale_id: i32) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("Sale {} not found", sale_id), "NOT_FOUND")),
    )
}

/// PATCH /api/sales/{id}/tracking
pub async fn update_tracking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(sale_id): Path<i32>,
    Json(payload): Json<UpdateTrackingRequest>,
) -> Result<Json<SaleTrackingResponse>, ApiError> {
    check_manual_auth(&headers, state.config.manual_trigger_secret.as_deref())?;

    let sale = sales_repo::set_tracking_number(
        &state.db,
        sale_id,
        payload.tracking_number.as_deref(),
        Utc::now(),
        state.config.tracking.first_check_delay(),
    )
    .await
    .map_err(|e| internal_error("Failed to update tracking number", e))?
    .ok_or_else(|| not_found(sale_id))?;

    Ok(Json(sale.into()))
}

/// PATCH /api/sales/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(sale_id): Path<i32>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<SaleTrackingResponse>, ApiError> {
    check_manual_auth(&headers, state.config.manual_trigger_secret.as_deref())?;

    let status: SaleStatus = payload.status.parse().map_err(|e: String| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e, "INVALID_STATUS")),
        )
    })?;

    let sale = sales_repo::set_status(&state.db, sale_id, status, Utc::now())
        .await
        .map_err(|e| internal_error("Failed to update sale status", e))?
        .ok_or_else(|| not_found(sale_id))?;

    Ok(Json(sale.into()))
}
