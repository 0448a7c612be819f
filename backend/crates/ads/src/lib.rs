//! Ads Confirmation Accounting Module
//!
//! Clean Architecture structure:
//! - `domain/` - Token store, history ledger, environments, repository traits
//! - `application/` - Configuration, confirmation coordinator, history queries
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers
//!
//! ## Accounting Model
//! - Every confirmation spends exactly one payment token, reserved before the
//!   request is built and committed only on transport success
//! - A failed or timed-out confirmation returns its token to the pool
//! - History entries are written only for committed confirmations
//! - Token ids reach the logs only as short one-way fingerprints

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AdsConfig;
pub use application::coordinator::ConfirmationCoordinator;
pub use error::{AdsError, AdsResult};
pub use infra::memory::MemoryAdsRepository;
pub use infra::postgres::PgAdsRepository;
pub use presentation::handlers::AdsAppState;
pub use presentation::router::{ads_router, ads_routes};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
