//! Integration tests for the ads crate
//! Exercises the coordinator, repositories and router against the in-memory store

#[cfg(test)]
mod support {
    use crate::application::config::AdsConfig;
    use crate::application::coordinator::ConfirmationCoordinator;
    use crate::domain::confirmation::{AdEvent, RequestDescriptor, TransportOutcome};
    use crate::domain::entities::{CommitOutcome, PaymentToken, ReleaseOutcome, Reservation};
    use crate::domain::repository::TokenRepository;
    use crate::domain::summary::SummaryUserData;
    use crate::domain::transport::ConfirmationTransport;
    use crate::domain::value_objects::{
        AdFormat, AdInteraction, CorrelationData, TokenId, TokenValue, UnblindedSignature,
    };
    use crate::error::{AdsError, AdsResult};
    use crate::infra::memory::MemoryAdsRepository;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    pub type MemoryCoordinator = ConfirmationCoordinator<MemoryAdsRepository, MemoryAdsRepository>;

    pub fn token(byte: u8, millis: u64) -> PaymentToken {
        PaymentToken::new(
            TokenId::from_bytes([byte; 32]),
            UnblindedSignature::new(vec![byte; 64]),
            TokenValue::from_millis(millis),
        )
    }

    pub fn event(creative: &str) -> AdEvent {
        AdEvent::new(
            AdInteraction::Viewed,
            AdFormat::NotificationAd,
            CorrelationData::new("placement-1", creative),
        )
    }

    pub fn coordinator(repo: &MemoryAdsRepository, config: AdsConfig) -> MemoryCoordinator {
        ConfirmationCoordinator::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(config),
        )
    }

    /// Always reports the same outcome and remembers what it was sent
    pub struct FixedTransport {
        outcome: TransportOutcome,
        pub sent: Mutex<Vec<RequestDescriptor>>,
    }

    impl FixedTransport {
        pub fn new(outcome: TransportOutcome) -> Self {
            Self {
                outcome,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl ConfirmationTransport for FixedTransport {
        async fn send(&self, request: &RequestDescriptor) -> TransportOutcome {
            self.sent.lock().await.push(request.clone());
            self.outcome.clone()
        }
    }

    /// Token store whose summary is slow or broken, so `begin` can be
    /// interrupted between reserving a token and building the request
    #[derive(Clone)]
    pub struct SlowSummaryRepository {
        pub inner: MemoryAdsRepository,
        delay: Duration,
        fail: bool,
    }

    impl SlowSummaryRepository {
        pub fn delayed(inner: MemoryAdsRepository, delay: Duration) -> Self {
            Self {
                inner,
                delay,
                fail: false,
            }
        }

        pub fn failing(inner: MemoryAdsRepository) -> Self {
            Self {
                inner,
                delay: Duration::ZERO,
                fail: true,
            }
        }
    }

    impl TokenRepository for SlowSummaryRepository {
        async fn ingest(&self, tokens: Vec<PaymentToken>) -> AdsResult<usize> {
            self.inner.ingest(tokens).await
        }

        async fn reserve(&self) -> AdsResult<Reservation> {
            self.inner.reserve().await
        }

        async fn commit(&self, reservation: &Reservation) -> AdsResult<CommitOutcome> {
            self.inner.commit(reservation).await
        }

        async fn release(&self, reservation: &Reservation) -> AdsResult<ReleaseOutcome> {
            self.inner.release(reservation).await
        }

        async fn summary(&self) -> AdsResult<SummaryUserData> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AdsError::Internal("summary unavailable".into()));
            }
            self.inner.summary().await
        }

        async fn recover_reservations(&self) -> AdsResult<u64> {
            self.inner.recover_reservations().await
        }

        async fn purge_redeemed(&self, cutoff: DateTime<Utc>) -> AdsResult<u64> {
            self.inner.purge_redeemed(cutoff).await
        }
    }

    pub fn slow_coordinator(
        tokens: SlowSummaryRepository,
    ) -> ConfirmationCoordinator<SlowSummaryRepository, MemoryAdsRepository> {
        let history = tokens.inner.clone();
        ConfirmationCoordinator::new(
            Arc::new(tokens),
            Arc::new(history),
            Arc::new(AdsConfig::development()),
        )
    }

    /// Never answers within any sane timeout
    pub struct StalledTransport;

    impl ConfirmationTransport for StalledTransport {
        async fn send(&self, _request: &RequestDescriptor) -> TransportOutcome {
            tokio::time::sleep(Duration::from_secs(60)).await;
            TransportOutcome::Success
        }
    }
}

#[cfg(test)]
mod token_store_tests {
    use super::support::token;
    use crate::domain::entities::{CommitOutcome, ReleaseOutcome};
    use crate::domain::repository::TokenRepository;
    use crate::domain::value_objects::{TokenId, TokenState};
    use crate::error::AdsError;
    use crate::infra::memory::MemoryAdsRepository;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_distinct_ingests_add_up() {
        let repo = MemoryAdsRepository::new();

        assert_eq!(repo.ingest(vec![token(1, 10), token(2, 10)]).await.unwrap(), 2);
        assert_eq!(repo.ingest(vec![token(3, 10)]).await.unwrap(), 1);
        assert_eq!(repo.snapshot_tokens().await.len(), 3);
    }

    #[tokio::test]
    async fn test_summary_counts_every_token_not_yet_redeemed() {
        let repo = MemoryAdsRepository::new();
        assert_eq!(repo.summary().await.unwrap().summary.unredeemed, 0);

        repo.ingest(vec![token(1, 100), token(2, 200), token(3, 400)])
            .await
            .unwrap();
        let spent = repo.reserve().await.unwrap();
        repo.commit(&spent).await.unwrap();
        repo.reserve().await.unwrap();

        // One redeemed, one reserved, one unredeemed
        let totals = repo.summary().await.unwrap().summary;
        assert_eq!(totals.unredeemed, 2);
        assert_eq!(totals.unredeemed_value, 600);
    }

    #[tokio::test]
    async fn test_duplicate_ingest_leaves_store_unchanged() {
        let repo = MemoryAdsRepository::new();
        repo.ingest(vec![token(1, 10)]).await.unwrap();

        let err = repo
            .ingest(vec![token(2, 10), token(1, 10)])
            .await
            .unwrap_err();
        assert!(matches!(err, AdsError::DuplicateTokenId(_)));

        let list = repo.snapshot_tokens().await;
        assert_eq!(list.len(), 1);
        assert!(list.get(&TokenId::from_bytes([2; 32])).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_are_unique() {
        let repo = Arc::new(MemoryAdsRepository::new());
        repo.ingest((0..64).map(|i| token(i, 1)).collect())
            .await
            .unwrap();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.reserve().await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let reservation = handle.await.unwrap().unwrap();
            assert!(ids.insert(reservation.token_id), "token reserved twice");
        }
        assert_eq!(ids.len(), 64);

        assert!(matches!(
            repo.reserve().await,
            Err(AdsError::NoTokensAvailable)
        ));
    }

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let repo = MemoryAdsRepository::new();
        repo.ingest(vec![token(1, 10)]).await.unwrap();

        let reservation = repo.reserve().await.unwrap();
        assert_eq!(
            repo.commit(&reservation).await.unwrap(),
            CommitOutcome::Committed
        );
        let once = repo.snapshot_tokens().await.as_slice()[0].clone();

        assert_eq!(
            repo.commit(&reservation).await.unwrap(),
            CommitOutcome::AlreadyCommitted
        );
        let twice = repo.snapshot_tokens().await.as_slice()[0].clone();

        assert_eq!(twice.state, TokenState::Redeemed);
        assert_eq!(once.redeemed_at, twice.redeemed_at);
        assert_eq!(once.generation, twice.generation);
    }

    #[tokio::test]
    async fn test_release_makes_token_available_again() {
        let repo = MemoryAdsRepository::new();
        repo.ingest(vec![token(1, 10), token(2, 10)]).await.unwrap();

        let first = repo.reserve().await.unwrap();
        assert_eq!(
            repo.release(&first).await.unwrap(),
            ReleaseOutcome::Released
        );

        let again = repo.reserve().await.unwrap();
        assert_eq!(again.token_id, first.token_id);
        assert!(again.generation > first.generation);
    }

    #[tokio::test]
    async fn test_stale_reservation_cannot_commit_or_release() {
        let repo = MemoryAdsRepository::new();
        repo.ingest(vec![token(1, 10)]).await.unwrap();

        let stale = repo.reserve().await.unwrap();
        repo.release(&stale).await.unwrap();
        let live = repo.reserve().await.unwrap();

        assert!(matches!(
            repo.commit(&stale).await,
            Err(AdsError::CommitOnUnknownReservation(_))
        ));
        assert_eq!(repo.release(&stale).await.unwrap(), ReleaseOutcome::Stale);

        assert_eq!(repo.commit(&live).await.unwrap(), CommitOutcome::Committed);
    }
}

#[cfg(test)]
mod coordinator_tests {
    use super::support::{FixedTransport, StalledTransport, coordinator, event, token};
    use crate::application::config::AdsConfig;
    use crate::domain::confirmation::{AttemptState, TransportOutcome};
    use crate::domain::environment::AnonymityClass;
    use crate::domain::repository::{AdHistoryRepository, TokenRepository};
    use crate::domain::value_objects::{TokenId, TokenState};
    use crate::error::AdsError;
    use crate::infra::memory::MemoryAdsRepository;
    use chrono::{TimeDelta, Utc};
    use std::time::Duration;

    fn state_of(list: &crate::domain::token_list::PaymentTokenList, byte: u8) -> TokenState {
        list.get(&TokenId::from_bytes([byte; 32])).unwrap().state
    }

    #[tokio::test]
    async fn test_commit_spends_oldest_then_next() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator
            .ingest(vec![token(0xA, 10), token(0xB, 10), token(0xC, 10)])
            .await
            .unwrap();
        let transport = FixedTransport::new(TransportOutcome::Success);

        let state = coordinator.confirm(event("creative-1"), &transport).await.unwrap();
        assert_eq!(state, AttemptState::Committed);
        assert_eq!(
            transport.sent.lock().await[0].token_id,
            TokenId::from_bytes([0xA; 32])
        );

        let list = repo.snapshot_tokens().await;
        assert_eq!(state_of(&list, 0xA), TokenState::Redeemed);
        assert_eq!(state_of(&list, 0xB), TokenState::Unredeemed);
        assert_eq!(state_of(&list, 0xC), TokenState::Unredeemed);
        assert_eq!(repo.snapshot().await.unwrap().len(), 1);

        let next = repo.reserve().await.unwrap();
        assert_eq!(next.token_id, TokenId::from_bytes([0xB; 32]));
    }

    #[tokio::test]
    async fn test_timeout_returns_token_to_pool() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator
            .ingest(vec![token(0xA, 10), token(0xB, 10)])
            .await
            .unwrap();

        let request = coordinator.begin(event("creative-1")).await.unwrap();
        assert_eq!(request.token_id, TokenId::from_bytes([0xA; 32]));

        let state = coordinator
            .on_transport_result(request.attempt_id, TransportOutcome::Timeout)
            .await
            .unwrap();
        assert_eq!(state, AttemptState::Released);
        assert!(repo.snapshot().await.unwrap().is_empty());

        let again = repo.reserve().await.unwrap();
        assert_eq!(again.token_id, TokenId::from_bytes([0xA; 32]));
    }

    #[tokio::test]
    async fn test_failure_records_no_history() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator.ingest(vec![token(1, 10)]).await.unwrap();
        let transport = FixedTransport::new(TransportOutcome::Failure("HTTP 500".into()));

        let state = coordinator.confirm(event("creative-1"), &transport).await.unwrap();

        assert_eq!(state, AttemptState::Released);
        assert!(repo.snapshot().await.unwrap().is_empty());
        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Unredeemed), 1);
        assert_eq!(coordinator.pending_attempts(), 0);
    }

    #[tokio::test]
    async fn test_slow_transport_times_out() {
        let repo = MemoryAdsRepository::new();
        let config = AdsConfig {
            transport_timeout: Duration::from_millis(20),
            ..AdsConfig::development()
        };
        let coordinator = coordinator(&repo, config);
        coordinator.ingest(vec![token(1, 10)]).await.unwrap();

        let state = coordinator
            .confirm(event("creative-1"), &StalledTransport)
            .await
            .unwrap();

        assert_eq!(state, AttemptState::Released);
        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Unredeemed), 1);
    }

    #[tokio::test]
    async fn test_late_success_after_release_is_ignored() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator.ingest(vec![token(1, 10)]).await.unwrap();

        let request = coordinator.begin(event("creative-1")).await.unwrap();
        coordinator
            .on_transport_result(request.attempt_id, TransportOutcome::Timeout)
            .await
            .unwrap();

        let late = coordinator
            .on_transport_result(request.attempt_id, TransportOutcome::Success)
            .await
            .unwrap();

        assert_eq!(late, AttemptState::Ignored);
        assert!(repo.snapshot().await.unwrap().is_empty());
        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Redeemed), 0);
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_tokens() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        let transport = FixedTransport::new(TransportOutcome::Success);

        let err = coordinator
            .confirm(event("creative-1"), &transport)
            .await
            .unwrap_err();

        assert!(matches!(err, AdsError::NoTokensAvailable));
        assert!(transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_request_targets_configured_environment() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator
            .ingest(vec![token(1, 100), token(2, 150)])
            .await
            .unwrap();

        let request = coordinator
            .begin(event("creative-1").with_anonymity(AnonymityClass::NonAnonymous))
            .await
            .unwrap();

        assert_eq!(request.host, "https://mywallet.ads.brave.software");
        assert!(
            request
                .url
                .starts_with("https://mywallet.ads.brave.software/v3/confirmation/payment/")
        );
        // The reserved token still counts until it is redeemed
        assert!(
            request
                .payload
                .contains(r#""summary":{"unredeemed":2,"unredeemedValue":250}"#)
        );
        assert!(!request.payload.contains("creative-1"));
    }

    #[tokio::test]
    async fn test_history_respects_max_entries() {
        let repo = MemoryAdsRepository::new();
        let config = AdsConfig {
            history_max_entries: 2,
            ..AdsConfig::development()
        };
        let coordinator = coordinator(&repo, config);
        coordinator
            .ingest((1..=3).map(|i| token(i, 10)).collect())
            .await
            .unwrap();
        let transport = FixedTransport::new(TransportOutcome::Success);

        let start = Utc::now();
        for (i, creative) in ["first", "second", "third"].into_iter().enumerate() {
            let event = event(creative).with_occurred_at(start + TimeDelta::seconds(i as i64));
            coordinator.confirm(event, &transport).await.unwrap();
        }

        let retained: Vec<_> = repo
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.entry.correlation.creative_instance_id)
            .collect();
        assert_eq!(retained, vec!["second", "third"]);
    }

    #[tokio::test]
    async fn test_release_stale_attempts() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator
            .ingest(vec![token(1, 10), token(2, 10)])
            .await
            .unwrap();

        coordinator.begin(event("creative-1")).await.unwrap();
        assert_eq!(coordinator.pending_attempts(), 1);

        assert_eq!(coordinator.release_stale_attempts(Utc::now()).await, 0);
        let later = Utc::now() + TimeDelta::seconds(31);
        assert_eq!(coordinator.release_stale_attempts(later).await, 1);

        assert_eq!(coordinator.pending_attempts(), 0);
        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Reserved), 0);
    }

    #[tokio::test]
    async fn test_restart_recovers_reservations() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator
            .ingest(vec![token(1, 10), token(2, 10)])
            .await
            .unwrap();
        let request = coordinator.begin(event("creative-1")).await.unwrap();

        // Persist and reload as a fresh process would
        let saved = serde_json::to_string(&repo.snapshot_tokens().await).unwrap();
        let restored = MemoryAdsRepository::restore(
            serde_json::from_str(&saved).unwrap(),
            repo.snapshot().await.unwrap(),
        );
        let restarted = super::support::coordinator(&restored, AdsConfig::development());

        assert_eq!(restarted.recover_reservations().await.unwrap(), 1);
        assert_eq!(
            restored.snapshot_tokens().await.count(TokenState::Unredeemed),
            2
        );
        assert_eq!(restored.reserve().await.unwrap().token_id, request.token_id);
    }

    #[tokio::test]
    async fn test_purge_redeemed_honours_retention() {
        let repo = MemoryAdsRepository::new();
        let coordinator = coordinator(&repo, AdsConfig::development());
        coordinator
            .ingest(vec![token(1, 10), token(2, 10)])
            .await
            .unwrap();
        let transport = FixedTransport::new(TransportOutcome::Success);
        coordinator.confirm(event("creative-1"), &transport).await.unwrap();

        assert_eq!(coordinator.purge_redeemed(Utc::now()).await.unwrap(), 0);

        let after_retention = Utc::now() + TimeDelta::days(8);
        assert_eq!(coordinator.purge_redeemed(after_retention).await.unwrap(), 1);
        assert_eq!(repo.snapshot_tokens().await.len(), 1);
    }
}

#[cfg(test)]
mod attempt_lifecycle_tests {
    use super::support::{
        FixedTransport, SlowSummaryRepository, coordinator, event, slow_coordinator, token,
    };
    use crate::application::config::AdsConfig;
    use crate::domain::confirmation::{AttemptState, TransportOutcome};
    use crate::domain::repository::{AdHistoryRepository, TokenRepository};
    use crate::domain::value_objects::TokenState;
    use crate::error::AdsError;
    use crate::infra::memory::MemoryAdsRepository;
    use chrono::{TimeDelta, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dropped_begin_leaves_attempt_for_maintenance() {
        let repo = MemoryAdsRepository::new();
        let coordinator = slow_coordinator(SlowSummaryRepository::delayed(
            repo.clone(),
            Duration::from_millis(200),
        ));
        coordinator.ingest(vec![token(1, 10)]).await.unwrap();

        // Caller gives up while the request is still being built
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), coordinator.begin(event("c-1"))).await;
        assert!(abandoned.is_err());

        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Reserved), 1);
        assert_eq!(coordinator.pending_attempts(), 1);

        let later = Utc::now() + TimeDelta::days(1);
        assert_eq!(coordinator.release_stale_attempts(later).await, 1);

        assert_eq!(coordinator.pending_attempts(), 0);
        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Reserved), 0);
        assert_eq!(
            repo.reserve().await.unwrap().token_id,
            token(1, 10).id
        );
    }

    #[tokio::test]
    async fn test_failed_request_build_releases_token() {
        let repo = MemoryAdsRepository::new();
        let coordinator = slow_coordinator(SlowSummaryRepository::failing(repo.clone()));
        coordinator.ingest(vec![token(1, 10)]).await.unwrap();

        let err = coordinator.begin(event("c-1")).await.unwrap_err();

        assert!(matches!(err, AdsError::Internal(_)));
        assert_eq!(coordinator.pending_attempts(), 0);
        assert_eq!(repo.snapshot_tokens().await.count(TokenState::Unredeemed), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirmations_spend_distinct_tokens() {
        const ATTEMPTS: u8 = 32;

        let repo = MemoryAdsRepository::new();
        let coordinator = Arc::new(coordinator(&repo, AdsConfig::development()));
        coordinator
            .ingest((0..ATTEMPTS).map(|i| token(i, 10)).collect())
            .await
            .unwrap();
        let transport = Arc::new(FixedTransport::new(TransportOutcome::Success));

        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|i| {
                let coordinator = coordinator.clone();
                let transport = transport.clone();
                tokio::spawn(async move {
                    let creative = format!("creative-{i}");
                    coordinator.confirm(event(&creative), &*transport).await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), AttemptState::Committed);
        }

        let sent = transport.sent.lock().await;
        let spent: HashSet<_> = sent.iter().map(|request| request.token_id).collect();
        assert_eq!(sent.len(), ATTEMPTS as usize);
        assert_eq!(spent.len(), ATTEMPTS as usize);

        let tokens = repo.snapshot_tokens().await;
        assert_eq!(tokens.count(TokenState::Redeemed), ATTEMPTS as usize);
        assert_eq!(repo.snapshot().await.unwrap().len(), ATTEMPTS as usize);
        assert_eq!(coordinator.pending_attempts(), 0);
    }
}

#[cfg(test)]
mod router_tests {
    use super::support::token;
    use crate::application::config::AdsConfig;
    use crate::infra::memory::MemoryAdsRepository;
    use crate::presentation::router::ads_router;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn token_json(byte: u8, value: u64) -> Value {
        json!({
            "id": platform::crypto::to_base64(&[byte; 32]),
            "unblindedSignature": platform::crypto::to_base64(&[byte; 64]),
            "value": value,
        })
    }

    fn begin_body(creative: &str) -> Value {
        json!({
            "type": "clicked",
            "adFormat": "new_tab_page_ad",
            "placementId": "placement-1",
            "creativeInstanceId": creative,
        })
    }

    #[tokio::test]
    async fn test_full_confirmation_over_http() {
        let app = ads_router(MemoryAdsRepository::new(), AdsConfig::development());

        let (status, body) = call(
            &app,
            "POST",
            "/tokens",
            Some(json!({ "tokens": [token_json(1, 250), token_json(2, 250)] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ingested"], 2);

        let (status, body) = call(&app, "POST", "/confirmations", Some(begin_body("c-1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["host"], "https://ads-serve.brave.software");
        let attempt_id = body["attemptId"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/confirmations/{attempt_id}/result"),
            Some(json!({ "outcome": "success" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "committed");

        let (_, body) = call(&app, "GET", "/tokens/summary", None).await;
        assert_eq!(
            body,
            json!({ "summary": { "unredeemed": 1, "unredeemedValue": 250 } })
        );

        let (status, body) = call(&app, "GET", "/history?order=desc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"], "descending");
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["correlation"]["creativeInstanceId"], "c-1");
    }

    #[tokio::test]
    async fn test_history_is_ordered_both_ways() {
        let app = ads_router(MemoryAdsRepository::new(), AdsConfig::development());
        call(
            &app,
            "POST",
            "/tokens",
            Some(json!({ "tokens": [token_json(1, 1), token_json(2, 1)] })),
        )
        .await;

        let late = Utc::now() - TimeDelta::days(1);
        let early = late - TimeDelta::days(1);
        let stamp = |at: DateTime<Utc>| at.to_rfc3339_opts(SecondsFormat::Secs, true);

        for (creative, at) in [("early", early), ("late", late)] {
            let mut body = begin_body(creative);
            body["occurredAt"] = json!(stamp(at));
            let (_, begun) = call(&app, "POST", "/confirmations", Some(body)).await;
            let attempt_id = begun["attemptId"].as_str().unwrap().to_string();
            call(
                &app,
                "POST",
                &format!("/confirmations/{attempt_id}/result"),
                Some(json!({ "outcome": "success" })),
            )
            .await;
        }

        let creatives = |body: &Value| -> Vec<String> {
            body["entries"]
                .as_array()
                .unwrap()
                .iter()
                .map(|e| e["correlation"]["creativeInstanceId"].as_str().unwrap().to_string())
                .collect()
        };

        let (_, asc) = call(&app, "GET", "/history?order=asc", None).await;
        let (_, desc) = call(&app, "GET", "/history?order=desc", None).await;
        assert_eq!(creatives(&asc), vec!["early", "late"]);
        assert_eq!(creatives(&desc), vec!["late", "early"]);

        let midway = stamp(early + TimeDelta::hours(12));
        let (_, ranged) = call(&app, "GET", &format!("/history?from={midway}"), None).await;
        assert_eq!(creatives(&ranged), vec!["late"]);

        let (status, _) = call(
            &app,
            "GET",
            "/history?from=2026-01-02T00:00:00Z&to=2026-01-01T00:00:00Z",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let repo = MemoryAdsRepository::new();
        let app = ads_router(repo.clone(), AdsConfig::development());

        let (status, body) = call(&app, "POST", "/confirmations", Some(begin_body("c-1"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], 503);

        call(
            &app,
            "POST",
            "/tokens",
            Some(json!({ "tokens": [token_json(1, 1)] })),
        )
        .await;
        let (status, _) = call(
            &app,
            "POST",
            "/tokens",
            Some(json!({ "tokens": [token_json(1, 1)] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            "POST",
            "/tokens",
            Some(json!({ "tokens": [{ "id": "not base64!", "unblindedSignature": "AA==", "value": 1 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(repo.snapshot_tokens().await.len(), 1);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/confirmations/{}/result", uuid::Uuid::new_v4()),
            Some(json!({ "outcome": "success" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "ignored");

        // Stored tokens are untouched by the unknown attempt
        assert_eq!(repo.snapshot_tokens().await.as_slice()[0].id, token(1, 1).id);
    }
}
