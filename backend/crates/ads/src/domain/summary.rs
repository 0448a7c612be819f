//! Summary User Data
//!
//! Aggregate view of token state that rides along with outbound
//! confirmations. Only counts leave the process; ids and signatures never do.

use crate::domain::entities::PaymentToken;
use crate::domain::value_objects::{TokenState, TokenValue};
use crate::error::AdsResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTotals {
    /// Tokens not yet redeemed (reserved tokens included)
    pub unredeemed: u64,
    /// Their combined value in milli-units
    pub unredeemed_value: u64,
}

/// `{"summary":{"unredeemed":N,"unredeemedValue":V}}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryUserData {
    pub summary: TokenTotals,
}

impl SummaryUserData {
    /// Canonical serialization. Field order is fixed by the struct layout and
    /// every value is an integer, so equal summaries give equal bytes.
    pub fn to_json(&self) -> AdsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build the summary for a token snapshot
pub fn build_summary(tokens: &[PaymentToken]) -> SummaryUserData {
    let outstanding = tokens
        .iter()
        .filter(|token| token.state != TokenState::Redeemed);

    let value: TokenValue = outstanding.clone().map(|token| token.value).sum();

    SummaryUserData {
        summary: TokenTotals {
            unredeemed: outstanding.count() as u64,
            unredeemed_value: value.millis(),
        },
    }
}
