//! Payment Token List
//!
//! Ordered token collection (insertion order = receipt order) and the state
//! machine every store implementation must follow:
//!
//! ```text
//! Unredeemed --reserve--> Reserved --commit--> Redeemed
//!      ^                     |
//!      +------release--------+
//! ```

use crate::domain::entities::{CommitOutcome, PaymentToken, ReleaseOutcome, Reservation};
use crate::domain::value_objects::{TokenId, TokenState};
use crate::error::{AdsError, AdsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentTokenList {
    tokens: Vec<PaymentToken>,
}

impl PaymentTokenList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap tokens already in receipt order (e.g. loaded from storage)
    pub fn from_tokens(tokens: Vec<PaymentToken>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_slice(&self) -> &[PaymentToken] {
        &self.tokens
    }

    pub fn get(&self, id: &TokenId) -> Option<&PaymentToken> {
        self.tokens.iter().find(|token| &token.id == id)
    }

    pub fn count(&self, state: TokenState) -> usize {
        self.tokens.iter().filter(|token| token.state == state).count()
    }

    /// Validate a whole issuer batch, then append it.
    ///
    /// All-or-nothing: any id that already exists, or that repeats inside the
    /// batch, rejects the batch and leaves the list untouched.
    pub fn ingest(&mut self, incoming: Vec<PaymentToken>) -> AdsResult<usize> {
        let mut seen: HashSet<TokenId> = self.tokens.iter().map(|token| token.id).collect();
        for token in &incoming {
            if !seen.insert(token.id) {
                return Err(AdsError::DuplicateTokenId(token.id.fingerprint()));
            }
            if !token.is_unredeemed() {
                return Err(AdsError::InvalidRequest(
                    "issued tokens must be unredeemed".into(),
                ));
            }
        }

        let added = incoming.len();
        self.tokens.extend(incoming);
        Ok(added)
    }

    /// Reserve the oldest unredeemed token
    pub fn reserve(&mut self) -> AdsResult<Reservation> {
        let token = self
            .tokens
            .iter_mut()
            .find(|token| token.is_unredeemed())
            .ok_or(AdsError::NoTokensAvailable)?;

        token.state = TokenState::Reserved;
        token.generation += 1;

        Ok(Reservation {
            token_id: token.id,
            generation: token.generation,
        })
    }

    /// Reserved -> Redeemed for the live reservation.
    ///
    /// Committing the same reservation twice is a no-op. A reservation that
    /// is unknown or no longer live yields `CommitOnUnknownReservation`.
    pub fn commit(
        &mut self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> AdsResult<CommitOutcome> {
        let unknown = || AdsError::CommitOnUnknownReservation(reservation.token_id.fingerprint());

        let token = self
            .tokens
            .iter_mut()
            .find(|token| token.id == reservation.token_id)
            .ok_or_else(unknown)?;

        if token.generation != reservation.generation {
            return Err(unknown());
        }

        match token.state {
            TokenState::Reserved => {
                token.state = TokenState::Redeemed;
                token.redeemed_at = Some(now);
                Ok(CommitOutcome::Committed)
            }
            TokenState::Redeemed => Ok(CommitOutcome::AlreadyCommitted),
            TokenState::Unredeemed => Err(unknown()),
        }
    }

    /// Reserved -> Unredeemed for the live reservation, otherwise a no-op
    pub fn release(&mut self, reservation: &Reservation) -> ReleaseOutcome {
        match self
            .tokens
            .iter_mut()
            .find(|token| token.id == reservation.token_id)
        {
            Some(token) if token.is_held_by(reservation) => {
                token.state = TokenState::Unredeemed;
                ReleaseOutcome::Released
            }
            _ => ReleaseOutcome::Stale,
        }
    }

    /// Restart rule: the fate of any in-flight request is unknown, so every
    /// reserved token becomes unredeemed again.
    pub fn recover_reservations(&mut self) -> usize {
        let mut recovered = 0;
        for token in self
            .tokens
            .iter_mut()
            .filter(|token| token.state == TokenState::Reserved)
        {
            token.state = TokenState::Unredeemed;
            recovered += 1;
        }
        recovered
    }

    /// Evict redeemed tokens whose redemption is older than `cutoff`
    pub fn purge_redeemed(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|token| {
            !(token.state == TokenState::Redeemed
                && token.redeemed_at.is_some_and(|at| at < cutoff))
        });
        before - self.tokens.len()
    }
}
