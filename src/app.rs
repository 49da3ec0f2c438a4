use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{alerts, health, news, portfolios, quotes};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/quotes", quotes::router())
        .nest("/api/portfolios", portfolios::router())
        .nest("/api/alerts", alerts::router())
        .nest("/api/news", news::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
