use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::news::{NewsItem, NewsQueryParams};
use crate::services::news_service;
use crate::services::quote_service::normalize_symbol;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_news))
}

/// GET /api/news?symbol=AAPL&limit=20&before=...
///
/// Most recent first; pass the oldest `published_at` from the previous page
/// as `before` to continue.
async fn list_news(
    State(state): State<AppState>,
    Query(params): Query<NewsQueryParams>,
) -> Result<Json<Vec<NewsItem>>, AppError> {
    let symbol = normalize_symbol(&params.symbol);
    if symbol.is_empty() {
        return Err(AppError::Validation("Symbol must not be empty".into()));
    }
    let limit = params.limit.unwrap_or(20);

    info!("GET /news - Listing news for {} (limit={})", symbol, limit);

    let items = news_service::by_symbol(&state.pool, &symbol, limit, params.before)
        .await
        .map_err(|e| {
            error!("Failed to list news for {}: {}", symbol, e);
            e
        })?;
    Ok(Json(items))
}
