//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (PaymentToken, AdHistoryEntry, Reservation)
//! - Domain value objects (TokenId, TokenValue, AdInteraction, ...)
//! - Domain services (token state machine, environment resolver,
//!   summary builder, history ordering and retention)
//! - Confirmation request types
//! - Repository and transport traits (interfaces)

pub mod confirmation;
pub mod entities;
pub mod environment;
pub mod history;
pub mod repository;
pub mod summary;
pub mod token_list;
pub mod transport;
pub mod value_objects;
