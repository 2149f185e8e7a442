//! Cryptographically secure random generation.
//!
//! Protocol message identifiers and artifact message handles both require
//! at least 128 bits of entropy; the generators here exceed that.

use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Minimum length of a protocol message identifier.
///
/// 16 alphanumeric characters carry log2(62^16) ≈ 95 bits; identifiers
/// generated here use 32 characters (≈190 bits), and caller-supplied
/// identifiers shorter than 16 characters are rejected by the message
/// factory.
pub const MIN_REQUEST_ID_LEN: usize = 16;

/// Length of an artifact message handle in bytes.
pub const MESSAGE_HANDLE_LEN: usize = 20;

/// Generates cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a fresh protocol message identifier.
///
/// The leading underscore keeps the identifier a valid XML NCName
/// regardless of the first random character.
#[must_use]
pub fn generate_request_id() -> String {
    format!("_{}", random_alphanumeric(32))
}

/// Generates a fresh 20-byte artifact message handle with no zero bytes.
#[must_use]
pub fn generate_message_handle() -> [u8; MESSAGE_HANDLE_LEN] {
    let mut rng = rand::rng();
    let mut handle = [0u8; MESSAGE_HANDLE_LEN];
    for byte in &mut handle {
        *byte = rng.random_range(1..=u8::MAX);
    }
    handle
}
