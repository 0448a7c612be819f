//! Transport Trait
//!
//! The network call itself lives outside this crate. Whatever performs it
//! reports back one [`TransportOutcome`] per request.

use crate::domain::confirmation::{RequestDescriptor, TransportOutcome};

#[trait_variant::make(ConfirmationTransport: Send)]
pub trait LocalConfirmationTransport {
    /// Deliver `request` and report how it went
    async fn send(&self, request: &RequestDescriptor) -> TransportOutcome;
}
