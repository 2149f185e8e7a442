//! Error types for service-provider SAML operations.
//!
//! Every rejection is fail-fast and local to the round trip that raised it;
//! no variant leaves residual session or correlation state behind.

use sp_crypto::CryptoError;
use thiserror::Error;

/// Result type for service-provider SAML operations.
pub type SpResult<T> = Result<T, SpError>;

/// Service-provider SAML errors.
#[derive(Debug, Error)]
pub enum SpError {
    /// Deployment configuration is missing or invalid; fatal at startup or
    /// first use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The current message is malformed (bad XML, wrong artifact length,
    /// undecodable envelope).
    #[error("format error: {0}")]
    Format(String),

    /// A required element or attribute is absent.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// XML or query-string signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// Signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Response correlation failed: the in-response-to identifier is
    /// missing, empty, or does not match an outstanding request.
    #[error("replay check failed: {0}")]
    Replay(String),

    /// The assertion is outside its validity window.
    #[error("time window violation: {0}")]
    TimeWindow(String),

    /// The assertion issuer does not match the configured IdP.
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The configured IdP entity ID.
        expected: String,
        /// The issuer found in the message.
        actual: String,
    },

    /// The assertion's audience restriction does not include this SP.
    #[error("audience mismatch: {expected} not in audience restriction")]
    AudienceMismatch {
        /// The SP entity ID that was expected in the audience.
        expected: String,
    },

    /// The IdP reported a non-success status.
    #[error("IdP returned non-success status: {code}")]
    Status {
        /// The reported status code URI.
        code: String,
    },

    /// The IdP reported `NoPassive`: the request asked for passive
    /// authentication but no active IdP session exists.
    #[error("IdP has no active session for passive authentication")]
    NoPassive,

    /// The artifact resolution call failed at the transport level.
    /// Never retried automatically.
    #[error("artifact resolution transport failure: {0}")]
    Transport(String),

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<CryptoError> for SpError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedAlgorithm { .. } | CryptoError::UnknownAlgorithm(_) => {
                Self::Configuration(err.to_string())
            }
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for SpError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Format(format!("XML parsing error: {err}"))
    }
}

impl From<base64::DecodeError> for SpError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Format(format!("base64 decode error: {err}"))
    }
}

impl From<std::io::Error> for SpError {
    fn from(err: std::io::Error) -> Self {
        Self::Format(format!("deflate error: {err}"))
    }
}
