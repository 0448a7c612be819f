//! Confirmation Coordinator
//!
//! Drives one confirmation attempt through
//!
//! ```text
//! Idle -> TokenReserved -> PayloadBuilt -> RequestEmitted -> Committed | Released
//! ```
//!
//! and owns every mutation of the token store and the history ledger.
//! Attempts waiting on the transport are tracked by attempt id; a result for
//! an id that is no longer pending is logged and ignored.
//!
//! An attempt is registered as pending in the same poll that its reservation
//! completes. A `begin` dropped at any later await therefore leaves a pending
//! entry for [`ConfirmationCoordinator::release_stale_attempts`] to release.

use crate::application::config::AdsConfig;
use crate::domain::confirmation::{
    AdEvent, AttemptState, ConfirmationPayload, RequestDescriptor, TransportOutcome,
};
use crate::domain::entities::{AdHistoryEntry, CommitOutcome, PaymentToken, Reservation};
use crate::domain::repository::{AdHistoryRepository, TokenRepository};
use crate::domain::summary::SummaryUserData;
use crate::domain::transport::ConfirmationTransport;
use crate::error::{AdsError, AdsResult};
use chrono::{DateTime, TimeDelta, Utc};
use kernel::id::AttemptId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct PendingAttempt {
    reservation: Reservation,
    event: AdEvent,
    emitted_at: DateTime<Utc>,
}

pub struct ConfirmationCoordinator<T, H>
where
    T: TokenRepository,
    H: AdHistoryRepository,
{
    token_repo: Arc<T>,
    history_repo: Arc<H>,
    config: Arc<AdsConfig>,
    pending: Mutex<HashMap<AttemptId, PendingAttempt>>,
}

impl<T, H> ConfirmationCoordinator<T, H>
where
    T: TokenRepository,
    H: AdHistoryRepository,
{
    pub fn new(token_repo: Arc<T>, history_repo: Arc<H>, config: Arc<AdsConfig>) -> Self {
        Self {
            token_repo,
            history_repo,
            config,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issuer boundary: store a freshly signed batch
    pub async fn ingest(&self, tokens: Vec<PaymentToken>) -> AdsResult<usize> {
        let added = self.token_repo.ingest(tokens).await?;
        tracing::info!(count = added, "Ingested payment token batch");
        Ok(added)
    }

    /// Current aggregate user data
    pub async fn summary(&self) -> AdsResult<SummaryUserData> {
        self.token_repo.summary().await
    }

    /// Reserve a token and build the request for `event`.
    ///
    /// The attempt stays pending until [`Self::on_transport_result`] or
    /// [`Self::release_stale_attempts`] resolves it.
    pub async fn begin(&self, event: AdEvent) -> AdsResult<RequestDescriptor> {
        let reservation = self.token_repo.reserve().await?;
        let attempt_id = AttemptId::new();

        // No await between the reservation and this insert
        self.pending().insert(
            attempt_id,
            PendingAttempt {
                reservation,
                event: event.clone(),
                emitted_at: Utc::now(),
            },
        );

        let request = match self.build_request(attempt_id, &reservation, &event).await {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(
                    attempt_id = %attempt_id,
                    error = %e,
                    "Failed to build confirmation request"
                );
                let abandoned = self.pending().remove(&attempt_id);
                if abandoned.is_some() {
                    self.release(&reservation).await;
                }
                return Err(e);
            }
        };

        tracing::info!(
            attempt_id = %attempt_id,
            token = %reservation.token_id.fingerprint(),
            host = request.host,
            anonymity = request.anonymity.as_str(),
            "Confirmation request emitted"
        );

        Ok(request)
    }

    /// Transport callback boundary
    pub async fn on_transport_result(
        &self,
        attempt_id: AttemptId,
        outcome: TransportOutcome,
    ) -> AdsResult<AttemptState> {
        let pending = self.pending().remove(&attempt_id);
        let Some(pending) = pending else {
            tracing::warn!(
                attempt_id = %attempt_id,
                outcome = ?outcome,
                "Transport result for unknown or expired attempt ignored"
            );
            return Ok(AttemptState::Ignored);
        };

        if let Err(e) = outcome.into_result() {
            e.log();
            self.release(&pending.reservation).await;
            tracing::info!(attempt_id = %attempt_id, "Confirmation released for retry");
            return Ok(AttemptState::Released);
        }

        match self.token_repo.commit(&pending.reservation).await {
            Ok(CommitOutcome::Committed) => {}
            Ok(CommitOutcome::AlreadyCommitted) => {
                tracing::debug!(attempt_id = %attempt_id, "Reservation already committed");
                return Ok(AttemptState::Ignored);
            }
            Err(e @ AdsError::CommitOnUnknownReservation(_)) => {
                e.log();
                return Ok(AttemptState::Ignored);
            }
            Err(e) => {
                // Keep the attempt so a redelivered result can still commit
                self.pending().insert(attempt_id, pending);
                return Err(e);
            }
        }

        let entry = AdHistoryEntry::new(
            pending.event.interaction,
            pending.event.ad_format,
            pending.event.correlation,
            pending.event.occurred_at,
        );
        match self
            .history_repo
            .append(&entry, &self.config.retention())
            .await
        {
            Ok(evicted) => tracing::info!(
                attempt_id = %attempt_id,
                entry_id = %entry.id,
                evicted,
                "Confirmation committed"
            ),
            // The token is spent either way; the ledger is best effort
            Err(e) => tracing::error!(
                attempt_id = %attempt_id,
                error = %e,
                "Confirmation committed but history append failed"
            ),
        }

        Ok(AttemptState::Committed)
    }

    /// Run one full attempt against `transport`, enforcing the configured
    /// timeout. Transport failures release the token and are reported as
    /// [`AttemptState::Released`], never as errors.
    pub async fn confirm<X>(&self, event: AdEvent, transport: &X) -> AdsResult<AttemptState>
    where
        X: ConfirmationTransport + Sync,
    {
        let request = self.begin(event).await?;

        let outcome = tokio::time::timeout(self.config.transport_timeout, transport.send(&request))
            .await
            .unwrap_or(TransportOutcome::Timeout);

        self.on_transport_result(request.attempt_id, outcome).await
    }

    /// Release every pending attempt older than the transport timeout.
    /// Returns the number released.
    pub async fn release_stale_attempts(&self, now: DateTime<Utc>) -> usize {
        let timeout = TimeDelta::from_std(self.config.transport_timeout).unwrap_or(TimeDelta::MAX);
        let stale: Vec<AttemptId> = self
            .pending()
            .iter()
            .filter(|(_, attempt)| now - attempt.emitted_at >= timeout)
            .map(|(id, _)| *id)
            .collect();

        let mut released = 0;
        for attempt_id in stale {
            if let Ok(AttemptState::Released) = self
                .on_transport_result(attempt_id, TransportOutcome::Timeout)
                .await
            {
                released += 1;
            }
        }
        released
    }

    /// Number of attempts awaiting a transport result
    pub fn pending_attempts(&self) -> usize {
        self.pending().len()
    }

    /// Startup recovery: nothing is in flight yet, so every reserved token
    /// goes back to the pool.
    pub async fn recover_reservations(&self) -> AdsResult<u64> {
        let recovered = self.token_repo.recover_reservations().await?;
        if recovered > 0 {
            tracing::warn!(recovered, "Recovered reservations left by previous run");
        }
        Ok(recovered)
    }

    /// Evict redeemed tokens past the retention window
    pub async fn purge_redeemed(&self, now: DateTime<Utc>) -> AdsResult<u64> {
        let retention =
            TimeDelta::from_std(self.config.redeemed_token_retention).unwrap_or(TimeDelta::MAX);
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return Ok(0);
        };
        let purged = self.token_repo.purge_redeemed(cutoff).await?;
        tracing::info!(purged, "Purged redeemed payment tokens");
        Ok(purged)
    }

    /// Never held across an await
    fn pending(&self) -> MutexGuard<'_, HashMap<AttemptId, PendingAttempt>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn build_request(
        &self,
        attempt_id: AttemptId,
        reservation: &Reservation,
        event: &AdEvent,
    ) -> AdsResult<RequestDescriptor> {
        let user_data = self.summary().await?;
        let payload = ConfirmationPayload::new(event, user_data).to_json()?;
        Ok(RequestDescriptor::new(
            attempt_id,
            self.config.environment,
            event.anonymity,
            payload,
            reservation.token_id,
        ))
    }

    /// Release that never fails the caller; a leftover reservation is
    /// recovered on the next start.
    async fn release(&self, reservation: &Reservation) {
        match self.token_repo.release(reservation).await {
            Ok(outcome) => tracing::debug!(
                token = %reservation.token_id.fingerprint(),
                outcome = ?outcome,
                "Reservation released"
            ),
            Err(e) => tracing::error!(
                token = %reservation.token_id.fingerprint(),
                error = %e,
                "Failed to release reservation"
            ),
        }
    }
}
