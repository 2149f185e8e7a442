//! XML Digital Signature support.
//!
//! Signing and verification of enveloped XML-DSig signatures over SAML
//! elements, plus the detached query-string signatures used by the
//! HTTP-Redirect binding.
//!
//! Canonicalization is exclusive C14N realized as whitespace
//! normalization; both directions use the same realization, which is what
//! makes sign/verify self-consistent and interoperable with peers that
//! emit canonical-form documents.

mod signer;
mod verifier;

pub use signer::*;
pub use verifier::*;

use sp_crypto::{DigestAlgorithm, KeyType, SigningAlgorithm};

use crate::types::{canonicalization_algorithms, ENVELOPED_SIGNATURE_TRANSFORM};

/// Configuration for signature creation.
#[derive(Debug, Clone, Copy)]
pub struct SignatureConfig {
    /// The signature algorithm to use.
    pub algorithm: SigningAlgorithm,
    /// Whether to attach the signer's certificate as KeyInfo.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm {
                key_type: KeyType::Rsa,
                digest: DigestAlgorithm::Sha256,
            },
            include_certificate: true,
        }
    }
}

impl SignatureConfig {
    /// Creates a configuration with the given algorithm.
    #[must_use]
    pub const fn with_algorithm(algorithm: SigningAlgorithm) -> Self {
        Self {
            algorithm,
            include_certificate: true,
        }
    }
}

/// Parsed `<ds:Signature>` contents.
#[derive(Debug, Clone)]
pub struct XmlSignatureInfo {
    /// The signature algorithm.
    pub algorithm: SigningAlgorithm,
    /// The reference URI (empty for whole-document signatures).
    pub reference_uri: String,
    /// The digest value, base64.
    pub digest_value: String,
    /// The signature value, base64.
    pub signature_value: String,
    /// The embedded X.509 certificate, base64 DER, if present.
    pub x509_certificate: Option<String>,
}

/// Canonicalizes XML content (exclusive C14N, whitespace-normalizing
/// realization).
pub(crate) fn canonicalize(xml: &str) -> String {
    xml.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the SignedInfo element shared by signing and verification.
pub(crate) fn build_signed_info(
    reference_uri: &str,
    digest_b64: &str,
    algorithm: SigningAlgorithm,
) -> String {
    format!(
        r#"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:CanonicalizationMethod Algorithm="{c14n}"/>
<ds:SignatureMethod Algorithm="{alg}"/>
<ds:Reference URI="{reference_uri}">
<ds:Transforms>
<ds:Transform Algorithm="{enveloped}"/>
<ds:Transform Algorithm="{c14n}"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="{digest}"/>
<ds:DigestValue>{digest_b64}</ds:DigestValue>
</ds:Reference>
</ds:SignedInfo>"#,
        c14n = canonicalization_algorithms::EXCLUSIVE_C14N,
        alg = algorithm.uri(),
        enveloped = ENVELOPED_SIGNATURE_TRANSFORM,
        digest = algorithm.digest.uri(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_rsa_sha256() {
        let config = SignatureConfig::default();
        assert_eq!(config.algorithm.digest, DigestAlgorithm::Sha256);
        assert!(config.include_certificate);
    }

    #[test]
    fn canonicalize_collapses_whitespace() {
        assert_eq!(canonicalize("  <a>\n   x  </a> "), "<a> x </a>");
    }

    #[test]
    fn signed_info_names_the_reference() {
        let info = build_signed_info("#_x", "ZGlnZXN0", SignatureConfig::default().algorithm);
        assert!(info.contains(r##"URI="#_x""##));
        assert!(info.contains("rsa-sha256"));
        assert!(info.contains("ZGlnZXN0"));
    }
}
