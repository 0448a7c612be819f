//! Query History Use Case
//!
//! Read-only view of the ad history for UI/API consumers.

use crate::domain::entities::AdHistoryEntry;
use crate::domain::history::{SortOrder, apply_range};
use crate::domain::repository::AdHistoryRepository;
use crate::error::AdsResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Input DTO for a history query
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryHistoryInput {
    pub order: SortOrder,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Query History Use Case
pub struct QueryHistoryUseCase<H>
where
    H: AdHistoryRepository,
{
    history_repo: Arc<H>,
}

impl<H> QueryHistoryUseCase<H>
where
    H: AdHistoryRepository,
{
    pub fn new(history_repo: Arc<H>) -> Self {
        Self { history_repo }
    }

    /// Fresh, ordered copy of the retained history
    pub async fn execute(&self, input: QueryHistoryInput) -> AdsResult<Vec<AdHistoryEntry>> {
        let snapshot = self.history_repo.snapshot().await?;
        Ok(apply_range(snapshot, input.order, input.from, input.to))
    }
}
