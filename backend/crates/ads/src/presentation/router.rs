//! Ads Router

use crate::application::config::AdsConfig;
use crate::domain::repository::{AdHistoryRepository, TokenRepository};
use crate::presentation::handlers::{self, AdsAppState};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Create the ads router for any repository implementation
pub fn ads_router<R>(repo: R, config: AdsConfig) -> Router
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    ads_routes(AdsAppState::new(Arc::new(repo), Arc::new(config)))
}

/// Create the ads router over existing state, so the caller can keep a
/// handle on the coordinator for startup recovery and maintenance
pub fn ads_routes<R>(state: AdsAppState<R>) -> Router
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/tokens", post(handlers::ingest_tokens::<R>))
        .route("/tokens/summary", get(handlers::summary::<R>))
        .route("/confirmations", post(handlers::begin_confirmation::<R>))
        .route(
            "/confirmations/{attempt_id}/result",
            post(handlers::transport_result::<R>),
        )
        .route("/history", get(handlers::history::<R>))
        .with_state(state)
}
