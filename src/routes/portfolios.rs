use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    CreateHolding, CreatePortfolio, Holding, Portfolio, UpdatePortfolio, Valuation,
    ValuationSnapshot,
};
use crate::routes::OwnerId;
use crate::services::{portfolio_service, valuation_service};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_portfolio).get(fetch_portfolios))
        .route("/:id", get(get_portfolio).put(update_portfolio).delete(delete_portfolio))
        .route("/:id/holdings", post(add_holding).get(list_holdings))
        .route("/:id/holdings/:holding_id", delete(remove_holding))
        .route("/:id/valuation", get(get_valuation))
        .route("/:id/history", get(get_history))
}

#[axum::debug_handler]
async fn create_portfolio(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Json(data): Json<CreatePortfolio>,
) -> Result<Json<Portfolio>, AppError> {
    info!("POST /portfolios - Creating new portfolio");
    let portfolio = portfolio_service::create(&state.pool, owner_id, data).await?;
    Ok(Json(portfolio))
}

async fn fetch_portfolios(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
) -> Result<Json<Vec<Portfolio>>, AppError> {
    info!("GET /portfolios - Fetching portfolios");
    let portfolios = portfolio_service::fetch_all(&state.pool, owner_id).await?;
    Ok(Json(portfolios))
}

async fn get_portfolio(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<Portfolio>, AppError> {
    info!("GET /portfolios/{} - Fetching portfolio", id);
    let portfolio = portfolio_service::fetch_one(&state.pool, id, owner_id).await?;
    Ok(Json(portfolio))
}

async fn update_portfolio(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdatePortfolio>,
) -> Result<Json<Portfolio>, AppError> {
    info!("PUT /portfolios/{} - Updating portfolio", id);
    let portfolio = portfolio_service::update(&state.pool, id, owner_id, data).await?;
    Ok(Json(portfolio))
}

async fn delete_portfolio(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /portfolios/{} - Deleting portfolio", id);
    portfolio_service::delete(&state.pool, id, owner_id)
        .await
        .map_err(|e| {
            error!("Failed to delete portfolio {}: {}", id, e);
            e
        })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_holding(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Json(data): Json<CreateHolding>,
) -> Result<Json<Holding>, AppError> {
    info!("POST /portfolios/{}/holdings - Adding {}", id, data.symbol);
    let holding =
        portfolio_service::add_holding(&state.pool, &state.portfolio_locks, id, owner_id, data)
            .await?;
    Ok(Json(holding))
}

async fn list_holdings(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Holding>>, AppError> {
    info!("GET /portfolios/{}/holdings - Listing holdings", id);
    let holdings = portfolio_service::list_holdings(&state.pool, id, owner_id).await?;
    Ok(Json(holdings))
}

async fn remove_holding(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path((id, holding_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /portfolios/{}/holdings/{} - Removing holding", id, holding_id);
    portfolio_service::remove_holding(&state.pool, &state.portfolio_locks, id, owner_id, holding_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_valuation(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<Valuation>, AppError> {
    info!("GET /portfolios/{}/valuation - Computing valuation", id);
    // Ownership first so a foreign portfolio 404s instead of valuing.
    portfolio_service::fetch_one(&state.pool, id, owner_id).await?;
    let valuation = valuation_service::compute(&state.pool, &state.quotes, id)
        .await
        .map_err(|e| {
            error!("Valuation failed for portfolio {}: {}", id, e);
            e
        })?;
    Ok(Json(valuation))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    days: Option<i64>,
}

async fn get_history(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ValuationSnapshot>>, AppError> {
    let days = params.days.unwrap_or(30);
    info!("GET /portfolios/{}/history - Fetching {} days", id, days);
    portfolio_service::fetch_one(&state.pool, id, owner_id).await?;
    let series = valuation_service::fetch_history(&state.pool, id, days).await?;
    Ok(Json(series))
}
