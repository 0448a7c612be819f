//! Confirmation Requests
//!
//! What goes into, and comes back from, one confirmation attempt.

use crate::domain::environment::{AnonymityClass, Environment, resolve_host};
use crate::domain::summary::SummaryUserData;
use crate::domain::value_objects::{AdFormat, AdInteraction, CorrelationData, TokenId};
use crate::error::{AdsError, AdsResult};
use chrono::{DateTime, Utc};
use kernel::id::AttemptId;
use serde::{Deserialize, Serialize};

const ANONYMOUS_CONFIRMATION_PATH: &str = "/v3/confirmation";
const NON_ANONYMOUS_CONFIRMATION_PATH: &str = "/v3/confirmation/payment";

/// An ad interaction waiting to be confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdEvent {
    pub interaction: AdInteraction,
    pub ad_format: AdFormat,
    pub correlation: CorrelationData,
    pub anonymity: AnonymityClass,
    pub occurred_at: DateTime<Utc>,
}

impl AdEvent {
    /// Anonymous event stamped with the current time
    pub fn new(interaction: AdInteraction, ad_format: AdFormat, correlation: CorrelationData) -> Self {
        Self {
            interaction,
            ad_format,
            correlation,
            anonymity: AnonymityClass::Anonymous,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_anonymity(mut self, anonymity: AnonymityClass) -> Self {
        self.anonymity = anonymity;
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Body of an outbound confirmation.
///
/// Carries only the interaction kind and aggregate user data; correlation
/// identifiers stay local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationPayload {
    #[serde(rename = "type")]
    pub interaction: AdInteraction,
    pub ad_format: AdFormat,
    pub user_data: SummaryUserData,
}

impl ConfirmationPayload {
    pub fn new(event: &AdEvent, user_data: SummaryUserData) -> Self {
        Self {
            interaction: event.interaction,
            ad_format: event.ad_format,
            user_data,
        }
    }

    pub fn to_json(&self) -> AdsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Everything the transport needs to send one confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub attempt_id: AttemptId,
    pub host: &'static str,
    pub url: String,
    pub anonymity: AnonymityClass,
    pub payload: String,
    pub token_id: TokenId,
}

impl RequestDescriptor {
    pub fn new(
        attempt_id: AttemptId,
        environment: Environment,
        anonymity: AnonymityClass,
        payload: String,
        token_id: TokenId,
    ) -> Self {
        let host = resolve_host(environment, anonymity);
        let path = match anonymity {
            AnonymityClass::Anonymous => ANONYMOUS_CONFIRMATION_PATH,
            AnonymityClass::NonAnonymous => NON_ANONYMOUS_CONFIRMATION_PATH,
        };
        Self {
            attempt_id,
            host,
            url: format!("{host}{path}/{attempt_id}"),
            anonymity,
            payload,
            token_id,
        }
    }
}

/// What the transport reports for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TransportOutcome {
    Success,
    Failure(String),
    Timeout,
}

impl TransportOutcome {
    /// Error view of a non-successful outcome
    pub fn into_result(self) -> AdsResult<()> {
        match self {
            TransportOutcome::Success => Ok(()),
            TransportOutcome::Failure(reason) => Err(AdsError::TransportFailure(reason)),
            TransportOutcome::Timeout => Err(AdsError::TransportTimeout),
        }
    }
}

/// Where a confirmation attempt ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// Token redeemed and interaction recorded
    Committed,
    /// Token returned to the pool; the caller may retry
    Released,
    /// Result for an attempt that is no longer pending; nothing changed
    Ignored,
}
