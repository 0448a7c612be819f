//! Ads Error Types
//!
//! This module provides ads-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Ads-specific result type alias
pub type AdsResult<T> = Result<T, AdsError>;

/// Ads-specific error variants
///
/// Token ids only ever appear here as log fingerprints.
#[derive(Debug, Error)]
pub enum AdsError {
    /// No unredeemed token to spend; retry after the next issuer batch
    #[error("No unredeemed payment tokens available")]
    NoTokensAvailable,

    /// Batch contains an id the store already holds (or repeats one)
    #[error("Duplicate payment token id: {0}")]
    DuplicateTokenId(String),

    /// Unknown deployment environment name
    #[error("Invalid environment: {0}")]
    InvalidEnvironment(String),

    /// Any other configuration defect
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Confirmation transport failed: {0}")]
    TransportFailure(String),

    #[error("Confirmation transport timed out")]
    TransportTimeout,

    /// Commit for a reservation that is unknown or no longer live
    #[error("Commit on unknown reservation for token {0}")]
    CommitOnUnknownReservation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdsError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdsError::NoTokensAvailable => ErrorKind::ServiceUnavailable,
            AdsError::DuplicateTokenId(_) | AdsError::CommitOnUnknownReservation(_) => {
                ErrorKind::Conflict
            }
            AdsError::TransportFailure(_) => ErrorKind::BadGateway,
            AdsError::TransportTimeout => ErrorKind::GatewayTimeout,
            AdsError::InvalidRequest(_) => ErrorKind::BadRequest,
            AdsError::InvalidEnvironment(_)
            | AdsError::InvalidConfig(_)
            | AdsError::Serialization(_)
            | AdsError::Database(_)
            | AdsError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Whether a later attempt can succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AdsError::NoTokensAvailable | AdsError::TransportFailure(_) | AdsError::TransportTimeout
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AdsError::Database(e) => {
                tracing::error!(error = %e, "Ads database error");
            }
            AdsError::Internal(msg) => {
                tracing::error!(message = %msg, "Ads internal error");
            }
            AdsError::InvalidEnvironment(_) | AdsError::InvalidConfig(_) => {
                tracing::error!(error = %self, "Ads configuration defect");
            }
            AdsError::DuplicateTokenId(fingerprint) => {
                tracing::warn!(token = %fingerprint, "Rejected token batch with duplicate id");
            }
            AdsError::CommitOnUnknownReservation(fingerprint) => {
                tracing::warn!(token = %fingerprint, "Commit on unknown reservation ignored");
            }
            AdsError::TransportFailure(_) | AdsError::TransportTimeout => {
                tracing::warn!(error = %self, "Confirmation attempt failed");
            }
            _ => {
                tracing::debug!(error = %self, "Ads error");
            }
        }
    }
}

impl From<AdsError> for AppError {
    fn from(err: AdsError) -> Self {
        let kind = err.kind();
        // Server-side details stay in the logs
        let message = if kind.is_server_error() && !err.is_recoverable() {
            kind.as_str().to_string()
        } else {
            err.to_string()
        };
        let app_err = AppError::new(kind, message);
        if err.is_recoverable() {
            app_err.with_action("Retry later")
        } else {
            app_err
        }
    }
}

impl IntoResponse for AdsError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
