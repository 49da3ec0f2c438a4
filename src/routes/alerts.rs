use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::alert_queries;
use crate::errors::AppError;
use crate::models::alert::{AlertEvent, AlertRule, CreateAlertRule};
use crate::routes::OwnerId;
use crate::services::alert_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_rule).get(list_rules))
        .route("/events", get(list_events))
        .route("/:id", get(get_rule).delete(delete_rule))
        .route("/:id/reset", post(reset_rule))
        .route("/:id/disable", post(disable_rule))
}

async fn create_rule(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Json(data): Json<CreateAlertRule>,
) -> Result<Json<AlertRule>, AppError> {
    info!("POST /alerts - Creating rule {} {} {}", data.symbol, data.condition, data.threshold);
    let rule = alert_service::create_rule(&state.pool, owner_id, data).await?;
    Ok(Json(rule))
}

async fn list_rules(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
) -> Result<Json<Vec<AlertRule>>, AppError> {
    info!("GET /alerts - Listing rules");
    let rules = alert_queries::fetch_all_for_owner(&state.pool, owner_id)
        .await
        .map_err(|e| {
            error!("Failed to list alert rules: {}", e);
            AppError::Db(e)
        })?;
    Ok(Json(rules))
}

async fn get_rule(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<AlertRule>, AppError> {
    info!("GET /alerts/{} - Fetching rule", id);
    let rule = alert_queries::fetch_one(&state.pool, id, owner_id)
        .await
        .map_err(AppError::Db)?
        .ok_or(AppError::NotFound)?;
    Ok(Json(rule))
}

async fn delete_rule(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /alerts/{} - Deleting rule", id);
    let deleted = alert_queries::delete(&state.pool, id, owner_id)
        .await
        .map_err(AppError::Db)?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_rule(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<()>, AppError> {
    info!("POST /alerts/{}/reset - Owner reset to active", id);
    alert_service::reset_rule(&state.pool, id, owner_id).await?;
    Ok(Json(()))
}

async fn disable_rule(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<()>, AppError> {
    info!("POST /alerts/{}/disable - Disabling rule", id);
    alert_service::disable_rule(&state.pool, id, owner_id).await?;
    Ok(Json(()))
}

#[derive(Debug, Deserialize)]
struct EventParams {
    limit: Option<i64>,
}

async fn list_events(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(params): Query<EventParams>,
) -> Result<Json<Vec<AlertEvent>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    info!("GET /alerts/events - Listing last {} trigger events", limit);
    let events = alert_queries::fetch_events_for_owner(&state.pool, owner_id, limit)
        .await
        .map_err(AppError::Db)?;
    Ok(Json(events))
}
