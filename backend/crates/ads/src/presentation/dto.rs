//! API DTOs (Data Transfer Objects)

use crate::domain::confirmation::{AdEvent, AttemptState, RequestDescriptor};
use crate::domain::entities::{AdHistoryEntry, PaymentToken};
use crate::domain::environment::AnonymityClass;
use crate::domain::history::SortOrder;
use crate::domain::value_objects::{
    AdFormat, AdInteraction, CorrelationData, TokenId, TokenValue, UnblindedSignature,
};
use crate::error::{AdsError, AdsResult};
use chrono::{DateTime, Utc};
use kernel::id::AttemptId;
use serde::{Deserialize, Serialize};

/// One issuer-signed token, base64 encoded
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDto {
    pub id: String,
    pub unblinded_signature: String,
    /// Milli-units
    pub value: u64,
}

impl TokenDto {
    pub fn into_payment_token(self) -> AdsResult<PaymentToken> {
        let id = TokenId::from_base64(&self.id)?;
        let signature = platform::crypto::from_base64(&self.unblinded_signature)
            .map_err(|_| AdsError::InvalidRequest("signature is not valid base64".into()))?;
        if signature.is_empty() {
            return Err(AdsError::InvalidRequest("signature must not be empty".into()));
        }
        Ok(PaymentToken::new(
            id,
            UnblindedSignature::new(signature),
            TokenValue::from_millis(self.value),
        ))
    }
}

/// Request for POST /api/ads/tokens
#[derive(Debug, Clone, Deserialize)]
pub struct IngestTokensRequest {
    pub tokens: Vec<TokenDto>,
}

impl IngestTokensRequest {
    pub fn into_payment_tokens(self) -> AdsResult<Vec<PaymentToken>> {
        self.tokens
            .into_iter()
            .map(TokenDto::into_payment_token)
            .collect()
    }
}

/// Response for POST /api/ads/tokens
#[derive(Debug, Clone, Serialize)]
pub struct IngestTokensResponse {
    pub ingested: usize,
}

/// Request for POST /api/ads/confirmations
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginConfirmationRequest {
    #[serde(rename = "type")]
    pub interaction: AdInteraction,
    pub ad_format: AdFormat,
    pub placement_id: String,
    pub creative_instance_id: String,
    #[serde(default)]
    pub anonymity: AnonymityClass,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl BeginConfirmationRequest {
    pub fn into_event(self) -> AdEvent {
        let event = AdEvent::new(
            self.interaction,
            self.ad_format,
            CorrelationData::new(self.placement_id, self.creative_instance_id),
        )
        .with_anonymity(self.anonymity);
        match self.occurred_at {
            Some(at) => event.with_occurred_at(at),
            None => event,
        }
    }
}

/// Response for POST /api/ads/confirmations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptorResponse {
    pub attempt_id: AttemptId,
    pub host: &'static str,
    pub url: String,
    pub anonymity: AnonymityClass,
    pub payload: String,
    pub token_id: String,
}

impl From<RequestDescriptor> for RequestDescriptorResponse {
    fn from(request: RequestDescriptor) -> Self {
        Self {
            attempt_id: request.attempt_id,
            host: request.host,
            url: request.url,
            anonymity: request.anonymity,
            payload: request.payload,
            token_id: request.token_id.to_base64(),
        }
    }
}

/// Response for POST /api/ads/confirmations/{attempt_id}/result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStateResponse {
    pub attempt_id: AttemptId,
    pub state: AttemptState,
}

/// Query for GET /api/ads/history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub order: Option<SortOrder>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

/// Response for GET /api/ads/history
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub order: SortOrder,
    pub entries: Vec<AdHistoryEntry>,
}
