//! Repository Traits
//!
//! Interfaces for durable state. Implementations are in the infra layer and
//! must have finished persisting a transition before they return.

use crate::domain::entities::{
    AdHistoryEntry, CommitOutcome, PaymentToken, ReleaseOutcome, Reservation,
};
use crate::domain::history::{RetentionPolicy, SequencedEntry};
use crate::domain::summary::SummaryUserData;
use crate::error::AdsResult;
use chrono::{DateTime, Utc};

/// Payment token store.
///
/// `reserve`, `commit` and `release` are each one critical section: two
/// callers can never hold a reservation on the same token.
#[trait_variant::make(TokenRepository: Send)]
pub trait LocalTokenRepository {
    /// Append an issuer batch; all-or-nothing on duplicate ids
    async fn ingest(&self, tokens: Vec<PaymentToken>) -> AdsResult<usize>;

    /// Reserve the oldest unredeemed token
    async fn reserve(&self) -> AdsResult<Reservation>;

    /// Reserved -> Redeemed; idempotent for the same reservation
    async fn commit(&self, reservation: &Reservation) -> AdsResult<CommitOutcome>;

    /// Reserved -> Unredeemed; a stale reservation is a no-op
    async fn release(&self, reservation: &Reservation) -> AdsResult<ReleaseOutcome>;

    /// Aggregate counts over every token that is not yet redeemed
    async fn summary(&self) -> AdsResult<SummaryUserData>;

    /// Turn every reserved token back into an unredeemed one (startup)
    async fn recover_reservations(&self) -> AdsResult<u64>;

    /// Evict tokens redeemed before `cutoff`
    async fn purge_redeemed(&self, cutoff: DateTime<Utc>) -> AdsResult<u64>;
}

/// Ad history ledger
#[trait_variant::make(AdHistoryRepository: Send)]
pub trait LocalAdHistoryRepository {
    /// Append one entry, then evict per `retention`. Returns the evicted count.
    async fn append(&self, entry: &AdHistoryEntry, retention: &RetentionPolicy) -> AdsResult<u64>;

    /// Detached copy of every retained entry
    async fn snapshot(&self) -> AdsResult<Vec<SequencedEntry>>;
}
