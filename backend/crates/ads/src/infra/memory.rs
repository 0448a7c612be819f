//! In-Memory Repository Implementation
//!
//! Process-local store for development and tests. State can be exported with
//! [`MemoryAdsRepository::snapshot_tokens`] and fed back through
//! [`MemoryAdsRepository::restore`] to simulate a restart.

use crate::domain::entities::{
    AdHistoryEntry, CommitOutcome, PaymentToken, ReleaseOutcome, Reservation,
};
use crate::domain::history::{AdHistory, RetentionPolicy, SequencedEntry};
use crate::domain::repository::{AdHistoryRepository, TokenRepository};
use crate::domain::summary::{SummaryUserData, build_summary};
use crate::domain::token_list::PaymentTokenList;
use crate::error::AdsResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Clone, Default)]
pub struct MemoryAdsRepository {
    tokens: Arc<Mutex<PaymentTokenList>>,
    history: Arc<RwLock<AdHistory>>,
}

impl MemoryAdsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from previously exported state
    pub fn restore(tokens: PaymentTokenList, history: Vec<SequencedEntry>) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
            history: Arc::new(RwLock::new(AdHistory::from_entries(history))),
        }
    }

    pub async fn snapshot_tokens(&self) -> PaymentTokenList {
        self.tokens.lock().await.clone()
    }
}

impl TokenRepository for MemoryAdsRepository {
    async fn ingest(&self, tokens: Vec<PaymentToken>) -> AdsResult<usize> {
        self.tokens.lock().await.ingest(tokens)
    }

    async fn reserve(&self) -> AdsResult<Reservation> {
        let reservation = self.tokens.lock().await.reserve()?;
        tracing::debug!(
            token = %reservation.token_id.fingerprint(),
            generation = reservation.generation,
            "Token reserved"
        );
        Ok(reservation)
    }

    async fn commit(&self, reservation: &Reservation) -> AdsResult<CommitOutcome> {
        self.tokens.lock().await.commit(reservation, Utc::now())
    }

    async fn release(&self, reservation: &Reservation) -> AdsResult<ReleaseOutcome> {
        let outcome = self.tokens.lock().await.release(reservation);
        if outcome == ReleaseOutcome::Stale {
            tracing::warn!(
                token = %reservation.token_id.fingerprint(),
                "Release of stale reservation ignored"
            );
        }
        Ok(outcome)
    }

    async fn summary(&self) -> AdsResult<SummaryUserData> {
        Ok(build_summary(self.tokens.lock().await.as_slice()))
    }

    async fn recover_reservations(&self) -> AdsResult<u64> {
        Ok(self.tokens.lock().await.recover_reservations() as u64)
    }

    async fn purge_redeemed(&self, cutoff: DateTime<Utc>) -> AdsResult<u64> {
        Ok(self.tokens.lock().await.purge_redeemed(cutoff) as u64)
    }
}

impl AdHistoryRepository for MemoryAdsRepository {
    async fn append(&self, entry: &AdHistoryEntry, retention: &RetentionPolicy) -> AdsResult<u64> {
        let evicted = self
            .history
            .write()
            .await
            .append(entry.clone(), retention, Utc::now());
        Ok(evicted as u64)
    }

    async fn snapshot(&self) -> AdsResult<Vec<SequencedEntry>> {
        Ok(self.history.read().await.snapshot())
    }
}
