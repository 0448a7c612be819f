//! Domain Entities
//!
//! Core business entities for the ads accounting domain.

use crate::domain::value_objects::{
    AdFormat, AdInteraction, CorrelationData, TokenId, TokenState, TokenValue, UnblindedSignature,
};
use chrono::{DateTime, Utc};
use kernel::id::HistoryEntryId;
use serde::{Deserialize, Serialize};

/// Single-use payment token issued for ad engagement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentToken {
    pub id: TokenId,
    pub unblinded_signature: UnblindedSignature,
    pub value: TokenValue,
    pub state: TokenState,
    /// Bumped on every reservation so that a stale commit or release can be
    /// told apart from the current one.
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl PaymentToken {
    /// Create a freshly issued, unredeemed token
    pub fn new(id: TokenId, unblinded_signature: UnblindedSignature, value: TokenValue) -> Self {
        Self {
            id,
            unblinded_signature,
            value,
            state: TokenState::Unredeemed,
            generation: 0,
            created_at: Utc::now(),
            redeemed_at: None,
        }
    }

    pub fn is_unredeemed(&self) -> bool {
        self.state == TokenState::Unredeemed
    }

    /// Whether `reservation` is the live hold on this token
    pub fn is_held_by(&self, reservation: &Reservation) -> bool {
        self.state == TokenState::Reserved && self.generation == reservation.generation
    }
}

/// Exclusive hold on one token for the duration of a confirmation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub token_id: TokenId,
    pub generation: u64,
}

/// Outcome of committing a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Reserved -> Redeemed
    Committed,
    /// Same reservation was already committed; nothing changed
    AlreadyCommitted,
}

/// Outcome of releasing a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Reserved -> Unredeemed
    Released,
    /// The reservation was no longer live; nothing changed
    Stale,
}

/// One confirmed ad interaction.
///
/// Immutable once appended to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdHistoryEntry {
    pub id: HistoryEntryId,
    pub interaction: AdInteraction,
    pub ad_format: AdFormat,
    pub correlation: CorrelationData,
    pub timestamp: DateTime<Utc>,
}

impl AdHistoryEntry {
    pub fn new(
        interaction: AdInteraction,
        ad_format: AdFormat,
        correlation: CorrelationData,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryEntryId::new(),
            interaction,
            ad_format,
            correlation,
            timestamp,
        }
    }
}
