use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{QuoteBatch, QuoteResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_quote_batch))
        .route("/:symbol", get(get_quote))
}

#[derive(Debug, Deserialize)]
struct BatchParams {
    /// Comma-separated list of symbols.
    symbols: String,
}

async fn get_quote_batch(
    State(state): State<AppState>,
    Query(params): Query<BatchParams>,
) -> Result<Json<QuoteBatch>, AppError> {
    info!("GET /quotes - Batch lookup for [{}]", params.symbols);

    let symbols: Vec<String> = params
        .symbols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if symbols.is_empty() {
        return Err(AppError::Validation("No symbols provided".into()));
    }

    Ok(Json(state.quotes.get_quotes(&symbols).await))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<QuoteResult>, AppError> {
    info!("GET /quotes/{} - Single quote lookup", symbol);

    let result = state.quotes.get_quote(&symbol).await.map_err(|e| {
        error!("Quote lookup failed for {}: {}", symbol, e);
        e
    })?;
    Ok(Json(result))
}
