//! Domain Value Objects
//!
//! Immutable value types for the ads accounting domain.

use crate::error::{AdsError, AdsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a payment token identifier in bytes
pub const TOKEN_ID_LEN: usize = 32;

/// Opaque payment token identifier.
///
/// `Debug` only ever prints a one-way fingerprint, so a token id cannot leak
/// into logs by accident.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId([u8; TOKEN_ID_LEN]);

impl TokenId {
    pub const fn from_bytes(bytes: [u8; TOKEN_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Fresh random identifier (issuer stand-in and tests)
    pub fn random() -> Self {
        Self(platform::crypto::random_array())
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_ID_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        platform::crypto::to_base64(&self.0)
    }

    pub fn from_base64(encoded: &str) -> AdsResult<Self> {
        let bytes = platform::crypto::from_base64(encoded)
            .map_err(|_| AdsError::InvalidRequest("token id is not valid base64".into()))?;
        Self::from_slice(&bytes).ok_or_else(|| {
            AdsError::InvalidRequest(format!("token id must be {TOKEN_ID_LEN} bytes"))
        })
    }

    /// Log-safe tag for this id
    pub fn fingerprint(&self) -> String {
        platform::crypto::log_fingerprint(&self.0)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.fingerprint())
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Unblinded signature over a token, consumed as an opaque capability.
/// Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UnblindedSignature(Vec<u8>);

impl UnblindedSignature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for UnblindedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnblindedSignature(<redacted>)")
    }
}

impl Serialize for UnblindedSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&platform::crypto::to_base64(&self.0))
    }
}

impl<'de> Deserialize<'de> for UnblindedSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        platform::crypto::from_base64(&encoded)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Token value in milli-units of the reward currency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenValue(u64);

impl TokenValue {
    pub const ZERO: TokenValue = TokenValue(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn millis(&self) -> u64 {
        self.0
    }
}

impl Add for TokenValue {
    type Output = TokenValue;

    fn add(self, rhs: TokenValue) -> TokenValue {
        TokenValue(self.0.saturating_add(rhs.0))
    }
}

impl Sum for TokenValue {
    fn sum<I: Iterator<Item = TokenValue>>(iter: I) -> Self {
        iter.fold(TokenValue::ZERO, Add::add)
    }
}

/// Payment token lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unredeemed,
    /// Held by exactly one in-flight confirmation attempt
    Reserved,
    Redeemed,
}

impl TokenState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenState::Unredeemed => "unredeemed",
            TokenState::Reserved => "reserved",
            TokenState::Redeemed => "redeemed",
        }
    }
}

impl FromStr for TokenState {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unredeemed" => Ok(TokenState::Unredeemed),
            "reserved" => Ok(TokenState::Reserved),
            "redeemed" => Ok(TokenState::Redeemed),
            other => Err(AdsError::Internal(format!("unknown token state: {other}"))),
        }
    }
}

/// Kind of ad interaction being confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdInteraction {
    Served,
    Viewed,
    Clicked,
    Dismissed,
    Converted,
}

impl AdInteraction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AdInteraction::Served => "served",
            AdInteraction::Viewed => "viewed",
            AdInteraction::Clicked => "clicked",
            AdInteraction::Dismissed => "dismissed",
            AdInteraction::Converted => "converted",
        }
    }
}

impl FromStr for AdInteraction {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "served" => Ok(AdInteraction::Served),
            "viewed" => Ok(AdInteraction::Viewed),
            "clicked" => Ok(AdInteraction::Clicked),
            "dismissed" => Ok(AdInteraction::Dismissed),
            "converted" => Ok(AdInteraction::Converted),
            other => Err(AdsError::InvalidRequest(format!("unknown ad interaction: {other}"))),
        }
    }
}

/// Placement format of the ad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdFormat {
    NotificationAd,
    NewTabPageAd,
    InlineContentAd,
    PromotedContentAd,
    SearchResultAd,
}

impl AdFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AdFormat::NotificationAd => "notification_ad",
            AdFormat::NewTabPageAd => "new_tab_page_ad",
            AdFormat::InlineContentAd => "inline_content_ad",
            AdFormat::PromotedContentAd => "promoted_content_ad",
            AdFormat::SearchResultAd => "search_result_ad",
        }
    }
}

impl FromStr for AdFormat {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notification_ad" => Ok(AdFormat::NotificationAd),
            "new_tab_page_ad" => Ok(AdFormat::NewTabPageAd),
            "inline_content_ad" => Ok(AdFormat::InlineContentAd),
            "promoted_content_ad" => Ok(AdFormat::PromotedContentAd),
            "search_result_ad" => Ok(AdFormat::SearchResultAd),
            other => Err(AdsError::InvalidRequest(format!("unknown ad format: {other}"))),
        }
    }
}

/// Opaque identifiers tying a history entry to the ad that was shown.
///
/// Deliberately has no slot for a token id: history and tokens must not
/// share a join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationData {
    pub placement_id: String,
    pub creative_instance_id: String,
}

impl CorrelationData {
    pub fn new(placement_id: impl Into<String>, creative_instance_id: impl Into<String>) -> Self {
        Self {
            placement_id: placement_id.into(),
            creative_instance_id: creative_instance_id.into(),
        }
    }
}
