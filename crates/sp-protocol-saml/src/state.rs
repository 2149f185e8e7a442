//! Capability interfaces to the hosting application.
//!
//! The protocol engine never touches certificate stores or session
//! persistence directly; the host supplies both through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SpResult;

/// Certificate material for one deployment.
///
/// Loaded once at startup and shared read-only for the process lifetime.
/// The IdP entry is used for verification only; the SP entry signs
/// outbound messages and decrypts encrypted assertions.
#[derive(Clone)]
pub struct CertificatePair {
    /// The IdP verification material: an X.509 certificate in DER form, or
    /// a bare `SubjectPublicKeyInfo`.
    pub idp_certificate_der: Vec<u8>,

    /// The SP X.509 certificate in DER form, attached as KeyInfo to
    /// outbound signatures.
    pub sp_certificate_der: Vec<u8>,

    /// The SP private key in DER form (PKCS#8 or PKCS#1).
    pub sp_private_key_der: Vec<u8>,
}

impl std::fmt::Debug for CertificatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificatePair")
            .field("idp_certificate_der", &self.idp_certificate_der.len())
            .field("sp_certificate_der", &self.sp_certificate_der.len())
            .field("sp_private_key_der", &"<redacted>")
            .finish()
    }
}

/// Supplies the certificate pair for the deployment.
#[async_trait]
pub trait CertificateProvider: Send + Sync + 'static {
    /// Returns the IdP public certificate and the SP key pair.
    async fn certificates(&self) -> SpResult<CertificatePair>;
}

/// The identifier of one outstanding protocol round trip.
///
/// Held by the external store between the outbound redirect and the
/// inbound response, and removed once consumed. A correlation present at
/// response time must match a round trip this process actually initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCorrelation {
    /// The identifier of the outstanding AuthnRequest or LogoutRequest.
    pub request_id: String,

    /// The post-login redirect target carried as RelayState.
    pub relay_state: Option<String>,

    /// When the round trip was initiated.
    pub issued_at: DateTime<Utc>,
}

impl PendingCorrelation {
    /// Creates a correlation entry for a freshly issued request.
    #[must_use]
    pub fn new(request_id: impl Into<String>, relay_state: Option<&str>) -> Self {
        Self {
            request_id: request_id.into(),
            relay_state: relay_state.map(String::from),
            issued_at: Utc::now(),
        }
    }
}

/// Persists the pending correlation for one logical user session.
///
/// Scoped to a single pending round trip; the engine never holds more than
/// one outstanding correlation per session. Stale entries are left to the
/// store's own lifetime policy.
#[async_trait]
pub trait CorrelationStore: Send + Sync + 'static {
    /// Saves the correlation for an initiated round trip.
    async fn save(&self, correlation: PendingCorrelation) -> SpResult<()>;

    /// Loads the outstanding correlation, if any.
    async fn load(&self) -> SpResult<Option<PendingCorrelation>>;

    /// Removes the outstanding correlation.
    async fn remove(&self) -> SpResult<()>;
}
