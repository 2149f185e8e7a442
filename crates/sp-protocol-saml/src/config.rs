//! Deployment configuration.
//!
//! Raw per-deployment settings deserialize into [`IdentityProviderConfig`]
//! and [`ServiceProviderConfig`]; [`SpConfiguration::resolve`] validates
//! them once at startup and produces the immutable configuration every
//! other component reads. Nothing defaults in place after resolution.

use chrono::Duration;
use serde::Deserialize;
use url::Url;

use sp_crypto::{KeyType, SigningAlgorithm};

use crate::error::{SpError, SpResult};
use crate::types::AuthnContextComparison;

const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 120;
const DEFAULT_SIGNATURE_ALGORITHM: &str = "SHA256";

/// Raw identity-provider settings for one deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    /// The IdP entity ID.
    pub entity_id: String,

    /// The IdP single sign-on service URL (HTTP-Redirect).
    pub sso_url: String,

    /// The IdP single logout service URL (HTTP-Redirect).
    pub slo_url: String,

    /// The IdP artifact resolution service URL (SOAP).
    pub artifact_resolution_url: String,

    /// Signature algorithm name ("SHA256") or XML-DSig URI.
    #[serde(default)]
    pub signature_algorithm: Option<String>,
}

/// Raw service-provider settings for one deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceProviderConfig {
    /// The SP entity ID.
    pub entity_id: String,

    /// The assertion consumer service URL responses are delivered to.
    pub assertion_consumer_service_url: String,

    /// Whether the IdP must re-authenticate the user.
    #[serde(default)]
    pub force_authn: bool,

    /// Whether the IdP must not interact with the user.
    #[serde(default)]
    pub is_passive: bool,

    /// Requested name ID format URI.
    #[serde(default)]
    pub name_id_format: Option<String>,

    /// Requested authentication context class references.
    #[serde(default)]
    pub authn_context_class_refs: Vec<String>,

    /// Authentication context comparison ("exact", "minimum", ...).
    #[serde(default)]
    pub authn_context_comparison: Option<String>,

    /// Skips assertion signature verification for deployments whose IdP
    /// signs the outer envelope only.
    #[serde(default)]
    pub omit_assertion_signature_check: bool,

    /// Clock-skew tolerance for time-window validation, in seconds.
    #[serde(default)]
    pub clock_skew_seconds: Option<i64>,

    /// Artifact endpoint index advertised in issued artifacts.
    #[serde(default)]
    pub artifact_endpoint_index: Option<u16>,
}

/// Resolved, immutable deployment configuration.
///
/// Produced once by [`SpConfiguration::resolve`]; read-only afterwards.
#[derive(Debug, Clone)]
pub struct SpConfiguration {
    /// The IdP entity ID.
    pub idp_entity_id: String,
    /// The IdP single sign-on URL.
    pub idp_sso_url: String,
    /// The IdP single logout URL.
    pub idp_slo_url: String,
    /// The IdP artifact resolution URL.
    pub artifact_resolution_url: String,

    /// The SP entity ID.
    pub sp_entity_id: String,
    /// The assertion consumer service URL.
    pub acs_url: String,

    /// Whether the IdP must re-authenticate the user.
    pub force_authn: bool,
    /// Whether the IdP must not interact with the user.
    pub is_passive: bool,
    /// Requested name ID format URI.
    pub name_id_format: Option<String>,
    /// Requested authentication context class references.
    pub authn_context_class_refs: Vec<String>,
    /// Authentication context comparison method.
    pub authn_context_comparison: AuthnContextComparison,

    /// Whether assertion signature verification is skipped.
    pub omit_assertion_signature_check: bool,
    /// Clock-skew tolerance for time-window validation.
    pub clock_skew: Duration,
    /// Artifact endpoint index advertised in issued artifacts.
    pub artifact_endpoint_index: u16,
    /// The signature algorithm used for outbound signing and inbound
    /// query-signature verification defaults.
    pub signature_algorithm: SigningAlgorithm,
}

impl SpConfiguration {
    /// Validates raw settings and freezes them into a resolved
    /// configuration. Applied once at startup; fails fast on any invalid
    /// or missing value.
    pub fn resolve(
        idp: IdentityProviderConfig,
        sp: ServiceProviderConfig,
    ) -> SpResult<Self> {
        require_entity_id("identity provider", &idp.entity_id)?;
        require_entity_id("service provider", &sp.entity_id)?;

        require_url("IdP SSO URL", &idp.sso_url)?;
        require_url("IdP SLO URL", &idp.slo_url)?;
        require_url("IdP artifact resolution URL", &idp.artifact_resolution_url)?;
        require_url("assertion consumer service URL", &sp.assertion_consumer_service_url)?;

        let skew_seconds = sp.clock_skew_seconds.unwrap_or(DEFAULT_CLOCK_SKEW_SECONDS);
        if skew_seconds <= 0 {
            return Err(SpError::Configuration(format!(
                "clock skew must be positive, got {skew_seconds}s"
            )));
        }

        let comparison = match sp.authn_context_comparison.as_deref() {
            None | Some("exact") => AuthnContextComparison::Exact,
            Some("minimum") => AuthnContextComparison::Minimum,
            Some("maximum") => AuthnContextComparison::Maximum,
            Some("better") => AuthnContextComparison::Better,
            Some(other) => {
                return Err(SpError::Configuration(format!(
                    "unknown authentication context comparison: {other}"
                )));
            }
        };

        let algorithm_name = idp
            .signature_algorithm
            .as_deref()
            .unwrap_or(DEFAULT_SIGNATURE_ALGORITHM);
        let signature_algorithm = SigningAlgorithm::resolve(KeyType::Rsa, algorithm_name)?;

        Ok(Self {
            idp_entity_id: idp.entity_id,
            idp_sso_url: idp.sso_url,
            idp_slo_url: idp.slo_url,
            artifact_resolution_url: idp.artifact_resolution_url,
            sp_entity_id: sp.entity_id,
            acs_url: sp.assertion_consumer_service_url,
            force_authn: sp.force_authn,
            is_passive: sp.is_passive,
            name_id_format: sp.name_id_format,
            authn_context_class_refs: sp.authn_context_class_refs,
            authn_context_comparison: comparison,
            omit_assertion_signature_check: sp.omit_assertion_signature_check,
            clock_skew: Duration::seconds(skew_seconds),
            artifact_endpoint_index: sp.artifact_endpoint_index.unwrap_or(0),
            signature_algorithm,
        })
    }
}

fn require_entity_id(role: &str, entity_id: &str) -> SpResult<()> {
    if entity_id.trim().is_empty() {
        return Err(SpError::Configuration(format!("{role} entity ID is empty")));
    }
    Ok(())
}

fn require_url(name: &str, value: &str) -> SpResult<()> {
    Url::parse(value)
        .map_err(|e| SpError::Configuration(format!("{name} is not a valid URL: {e}")))?;
    Ok(())
}

/// Raw configuration pair with sane values for unit tests.
#[cfg(test)]
pub(crate) fn test_raw_config() -> (IdentityProviderConfig, ServiceProviderConfig) {
    (
        IdentityProviderConfig {
            entity_id: "https://idp.example.com".to_string(),
            sso_url: "https://idp.example.com/sso".to_string(),
            slo_url: "https://idp.example.com/slo".to_string(),
            artifact_resolution_url: "https://idp.example.com/artifact".to_string(),
            signature_algorithm: None,
        },
        ServiceProviderConfig {
            entity_id: "https://sp.example.com".to_string(),
            assertion_consumer_service_url: "https://sp.example.com/acs".to_string(),
            force_authn: false,
            is_passive: false,
            name_id_format: Some(
                "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".to_string(),
            ),
            authn_context_class_refs: Vec::new(),
            authn_context_comparison: None,
            omit_assertion_signature_check: false,
            clock_skew_seconds: None,
            artifact_endpoint_index: None,
        },
    )
}

/// Resolved configuration with sane values for unit tests.
#[cfg(test)]
pub(crate) fn test_configuration() -> SpConfiguration {
    let (idp, sp) = test_raw_config();
    SpConfiguration::resolve(idp, sp).expect("test configuration resolves")
}
