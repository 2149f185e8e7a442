//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by cryptographic primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The (key type, digest) pairing has no backing implementation.
    #[error("unsupported algorithm pair: {key_type}/{digest}")]
    UnsupportedAlgorithm {
        /// The requested key type.
        key_type: &'static str,
        /// The requested digest.
        digest: &'static str,
    },

    /// An algorithm name or URI that is not recognized at all.
    #[error("unknown algorithm identifier: {0}")]
    UnknownAlgorithm(String),

    /// Key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A certificate could not be parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// PEM envelope missing or malformed.
    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A decryption operation failed.
    #[error("decryption failed: {0}")]
    Decryption(String),
}
