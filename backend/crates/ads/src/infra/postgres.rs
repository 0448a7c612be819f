//! PostgreSQL Repository Implementations

use crate::domain::entities::{
    AdHistoryEntry, CommitOutcome, PaymentToken, ReleaseOutcome, Reservation,
};
use crate::domain::history::{RetentionPolicy, SequencedEntry};
use crate::domain::repository::{AdHistoryRepository, TokenRepository};
use crate::domain::summary::{SummaryUserData, TokenTotals};
use crate::domain::value_objects::{CorrelationData, TokenId, TokenState};
use crate::error::{AdsError, AdsResult};
use chrono::{DateTime, Utc};
use kernel::id::HistoryEntryId;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgAdsRepository {
    pool: PgPool,
}

impl PgAdsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TokenRepository for PgAdsRepository {
    async fn ingest(&self, tokens: Vec<PaymentToken>) -> AdsResult<usize> {
        let mut seen = HashSet::with_capacity(tokens.len());
        for token in &tokens {
            if !seen.insert(token.id) {
                return Err(AdsError::DuplicateTokenId(token.id.fingerprint()));
            }
            if !token.is_unredeemed() {
                return Err(AdsError::InvalidRequest(
                    "ingested tokens must be unredeemed".into(),
                ));
            }
        }

        let ids: Vec<Vec<u8>> = tokens.iter().map(|t| t.id.as_bytes().to_vec()).collect();

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT token_id FROM ads_payment_tokens WHERE token_id = ANY($1) LIMIT 1",
        )
        .bind(&ids)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(bytes) = existing {
            let fingerprint = TokenId::from_slice(&bytes)
                .map(|id| id.fingerprint())
                .unwrap_or_default();
            return Err(AdsError::DuplicateTokenId(fingerprint));
        }

        // Insert order defines receipt order
        for token in &tokens {
            let inserted = sqlx::query(
                r#"
                INSERT INTO ads_payment_tokens (
                    token_id,
                    unblinded_signature,
                    value_millis,
                    state,
                    generation,
                    created_at
                ) VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(token.id.as_bytes().as_slice())
            .bind(token.unblinded_signature.as_bytes())
            .bind(to_i64(token.value.millis())?)
            .bind(token.state.as_str())
            .bind(to_i64(token.generation)?)
            .bind(token.created_at)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                // Lost a race with a concurrent ingest of the same id
                if is_unique_violation(&e) {
                    return Err(AdsError::DuplicateTokenId(token.id.fingerprint()));
                }
                return Err(e.into());
            }
        }

        tx.commit().await?;

        tracing::info!(count = tokens.len(), "Payment tokens stored");
        Ok(tokens.len())
    }

    async fn reserve(&self) -> AdsResult<Reservation> {
        let row = sqlx::query_as::<_, (Vec<u8>, i64)>(
            r#"
            UPDATE ads_payment_tokens
            SET state = 'reserved', generation = generation + 1
            WHERE token_id = (
                SELECT token_id FROM ads_payment_tokens
                WHERE state = 'unredeemed'
                ORDER BY receipt_seq
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING token_id, generation
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some((token_id, generation)) = row else {
            return Err(AdsError::NoTokensAvailable);
        };

        let reservation = Reservation {
            token_id: decode_token_id(&token_id)?,
            generation: to_u64(generation)?,
        };

        tracing::debug!(
            token = %reservation.token_id.fingerprint(),
            generation = reservation.generation,
            "Token reserved"
        );

        Ok(reservation)
    }

    async fn commit(&self, reservation: &Reservation) -> AdsResult<CommitOutcome> {
        let token_id = reservation.token_id.as_bytes().as_slice();
        let generation = to_i64(reservation.generation)?;

        let updated = sqlx::query(
            r#"
            UPDATE ads_payment_tokens
            SET state = 'redeemed', redeemed_at = $3
            WHERE token_id = $1 AND generation = $2 AND state = 'reserved'
            "#,
        )
        .bind(token_id)
        .bind(generation)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            return Ok(CommitOutcome::Committed);
        }

        // Tell a repeated commit apart from a stale one
        let current = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, generation FROM ads_payment_tokens WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((state, current_generation)) = current {
            if current_generation == generation && state.parse::<TokenState>()? == TokenState::Redeemed
            {
                return Ok(CommitOutcome::AlreadyCommitted);
            }
        }

        Err(AdsError::CommitOnUnknownReservation(
            reservation.token_id.fingerprint(),
        ))
    }

    async fn release(&self, reservation: &Reservation) -> AdsResult<ReleaseOutcome> {
        let updated = sqlx::query(
            r#"
            UPDATE ads_payment_tokens
            SET state = 'unredeemed'
            WHERE token_id = $1 AND generation = $2 AND state = 'reserved'
            "#,
        )
        .bind(reservation.token_id.as_bytes().as_slice())
        .bind(to_i64(reservation.generation)?)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            Ok(ReleaseOutcome::Released)
        } else {
            tracing::warn!(
                token = %reservation.token_id.fingerprint(),
                "Release of stale reservation ignored"
            );
            Ok(ReleaseOutcome::Stale)
        }
    }

    async fn summary(&self) -> AdsResult<SummaryUserData> {
        let (count, value_millis) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*)::BIGINT,
                COALESCE(SUM(value_millis), 0)::BIGINT
            FROM ads_payment_tokens
            WHERE state <> 'redeemed'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SummaryUserData {
            summary: TokenTotals {
                unredeemed: to_u64(count)?,
                unredeemed_value: to_u64(value_millis)?,
            },
        })
    }

    async fn recover_reservations(&self) -> AdsResult<u64> {
        let recovered = sqlx::query(
            "UPDATE ads_payment_tokens SET state = 'unredeemed' WHERE state = 'reserved'",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(recovered)
    }

    async fn purge_redeemed(&self, cutoff: DateTime<Utc>) -> AdsResult<u64> {
        let purged = sqlx::query(
            "DELETE FROM ads_payment_tokens WHERE state = 'redeemed' AND redeemed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(purged)
    }
}

impl AdHistoryRepository for PgAdsRepository {
    async fn append(&self, entry: &AdHistoryEntry, retention: &RetentionPolicy) -> AdsResult<u64> {
        let max_entries = i64::try_from(retention.max_entries).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO ads_history (
                history_entry_id,
                interaction,
                ad_format,
                placement_id,
                creative_instance_id,
                occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id.into_uuid())
        .bind(entry.interaction.as_str())
        .bind(entry.ad_format.as_str())
        .bind(&entry.correlation.placement_id)
        .bind(&entry.correlation.creative_instance_id)
        .bind(entry.timestamp)
        .execute(&mut *tx)
        .await?;

        let mut evicted = 0;

        if let Some(cutoff) = retention.cutoff(Utc::now()) {
            evicted += sqlx::query("DELETE FROM ads_history WHERE occurred_at < $1")
                .bind(cutoff)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        evicted += sqlx::query(
            r#"
            DELETE FROM ads_history
            WHERE seq IN (
                SELECT seq FROM ads_history
                ORDER BY occurred_at DESC, seq DESC
                OFFSET $1
            )
            "#,
        )
        .bind(max_entries)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::debug!(entry_id = %entry.id, evicted, "History entry appended");
        Ok(evicted)
    }

    async fn snapshot(&self) -> AdsResult<Vec<SequencedEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT
                history_entry_id,
                seq,
                interaction,
                ad_format,
                placement_id,
                creative_instance_id,
                occurred_at
            FROM ads_history
            ORDER BY occurred_at, seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HistoryRow::into_sequenced_entry).collect()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

fn to_i64(value: u64) -> AdsResult<i64> {
    i64::try_from(value).map_err(|_| AdsError::InvalidRequest(format!("{value} out of range")))
}

fn to_u64(value: i64) -> AdsResult<u64> {
    u64::try_from(value).map_err(|_| AdsError::Internal(format!("negative column value {value}")))
}

fn decode_token_id(bytes: &[u8]) -> AdsResult<TokenId> {
    TokenId::from_slice(bytes)
        .ok_or_else(|| AdsError::Internal(format!("stored token id has {} bytes", bytes.len())))
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct HistoryRow {
    history_entry_id: Uuid,
    seq: i64,
    interaction: String,
    ad_format: String,
    placement_id: String,
    creative_instance_id: String,
    occurred_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_sequenced_entry(self) -> AdsResult<SequencedEntry> {
        // Stored values were written by this crate; a parse failure is corruption
        let corrupt = |e: AdsError| AdsError::Internal(format!("corrupt history row: {e}"));
        Ok(SequencedEntry {
            sequence: to_u64(self.seq)?,
            entry: AdHistoryEntry {
                id: HistoryEntryId::from_uuid(self.history_entry_id),
                interaction: self.interaction.parse().map_err(corrupt)?,
                ad_format: self.ad_format.parse().map_err(corrupt)?,
                correlation: CorrelationData::new(self.placement_id, self.creative_instance_id),
                timestamp: self.occurred_at,
            },
        })
    }
}
