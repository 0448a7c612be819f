//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations that carry no domain meaning:
//! - Cryptographic utilities (SHA-256, secure random bytes, Base64)
//! - Log-safe fingerprints for secret identifiers

pub mod crypto;
