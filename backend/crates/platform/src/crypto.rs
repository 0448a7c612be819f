//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept by [`log_fingerprint`]
const FINGERPRINT_LEN: usize = 6;

/// Generate a fixed-size array of cryptographically secure random bytes
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode bytes as base64
pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 to bytes
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(s)
}

/// Short, one-way tag for a secret identifier.
///
/// Lets logs tell two identifiers apart without ever containing one.
pub fn log_fingerprint(secret: &[u8]) -> String {
    let digest = sha256(secret);
    general_purpose::URL_SAFE_NO_PAD.encode(&digest[..FINGERPRINT_LEN])
}
