//! HTTP Handlers

use crate::application::config::AdsConfig;
use crate::application::coordinator::ConfirmationCoordinator;
use crate::application::query_history::{QueryHistoryInput, QueryHistoryUseCase};
use crate::domain::confirmation::TransportOutcome;
use crate::domain::repository::{AdHistoryRepository, TokenRepository};
use crate::domain::summary::SummaryUserData;
use crate::error::{AdsError, AdsResult};
use crate::presentation::dto::{
    AttemptStateResponse, BeginConfirmationRequest, HistoryQuery, HistoryResponse,
    IngestTokensRequest, IngestTokensResponse, RequestDescriptorResponse,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use kernel::id::AttemptId;
use std::sync::Arc;

/// Shared state for ads handlers
pub struct AdsAppState<R>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    pub coordinator: Arc<ConfirmationCoordinator<R, R>>,
    pub history: Arc<QueryHistoryUseCase<R>>,
}

impl<R> AdsAppState<R>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, config: Arc<AdsConfig>) -> Self {
        Self {
            coordinator: Arc::new(ConfirmationCoordinator::new(
                repo.clone(),
                repo.clone(),
                config,
            )),
            history: Arc::new(QueryHistoryUseCase::new(repo)),
        }
    }
}

impl<R> Clone for AdsAppState<R>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            history: self.history.clone(),
        }
    }
}

/// POST /api/ads/tokens
pub async fn ingest_tokens<R>(
    State(state): State<AdsAppState<R>>,
    Json(req): Json<IngestTokensRequest>,
) -> AdsResult<(StatusCode, Json<IngestTokensResponse>)>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    if req.tokens.is_empty() {
        return Err(AdsError::InvalidRequest("token batch is empty".into()));
    }
    let tokens = req.into_payment_tokens()?;
    let ingested = state.coordinator.ingest(tokens).await?;
    Ok((StatusCode::CREATED, Json(IngestTokensResponse { ingested })))
}

/// GET /api/ads/tokens/summary
pub async fn summary<R>(State(state): State<AdsAppState<R>>) -> AdsResult<Json<SummaryUserData>>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    Ok(Json(state.coordinator.summary().await?))
}

/// POST /api/ads/confirmations
pub async fn begin_confirmation<R>(
    State(state): State<AdsAppState<R>>,
    Json(req): Json<BeginConfirmationRequest>,
) -> AdsResult<Json<RequestDescriptorResponse>>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    let request = state.coordinator.begin(req.into_event()).await?;
    Ok(Json(request.into()))
}

/// POST /api/ads/confirmations/{attempt_id}/result
pub async fn transport_result<R>(
    State(state): State<AdsAppState<R>>,
    Path(attempt_id): Path<AttemptId>,
    Json(outcome): Json<TransportOutcome>,
) -> AdsResult<Json<AttemptStateResponse>>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    let state = state
        .coordinator
        .on_transport_result(attempt_id, outcome)
        .await?;
    Ok(Json(AttemptStateResponse { attempt_id, state }))
}

/// GET /api/ads/history
pub async fn history<R>(
    State(state): State<AdsAppState<R>>,
    Query(query): Query<HistoryQuery>,
) -> AdsResult<Json<HistoryResponse>>
where
    R: TokenRepository + AdHistoryRepository + Send + Sync + 'static,
{
    let input = QueryHistoryInput {
        order: query.order.unwrap_or_default(),
        from: query.from,
        to: query.to,
    };
    if matches!((input.from, input.to), (Some(from), Some(to)) if from > to) {
        return Err(AdsError::InvalidRequest("from must not be after to".into()));
    }

    let entries = state.history.execute(input).await?;
    Ok(Json(HistoryResponse {
        order: input.order,
        entries,
    }))
}
