//! XML signature verification.
//!
//! Verification is boolean with hard preconditions: the document must have
//! been parsed with whitespace preserved, and the signature's reference
//! must point at the element actually being verified. A reference to any
//! other element is a signature-wrapping attempt and is rejected before
//! any cryptography runs.

use base64::Engine;

use sp_crypto::{hash, pem, SigningAlgorithm};

use crate::error::{SpError, SpResult};
use crate::xml::{self, SamlDocument};

use super::{build_signed_info, canonicalize, XmlSignatureInfo};

/// Verifies XML-DSig signatures and redirect-binding query signatures.
pub struct XmlSignatureVerifier {
    /// Trust anchors: X.509 certificates or bare public keys, DER form.
    trusted_keys: Vec<Vec<u8>>,
}

impl XmlSignatureVerifier {
    /// Creates a verifier with the given trust anchors.
    ///
    /// Each entry may be an X.509 certificate or a bare
    /// `SubjectPublicKeyInfo` / `RSAPublicKey` in DER form.
    #[must_use]
    pub fn new(trusted_keys: Vec<Vec<u8>>) -> Self {
        Self { trusted_keys }
    }

    /// Creates a verifier from PEM-encoded certificates.
    pub fn from_pem_certificates(certificates_pem: &[&str]) -> SpResult<Self> {
        let mut keys = Vec::new();
        for cert in certificates_pem {
            keys.push(pem::certificate_from_pem(cert)?);
        }
        Ok(Self::new(keys))
    }

    /// Verifies the signature on the element carrying `expected_id`.
    ///
    /// Tries the signature's embedded certificate when it is in the trust
    /// list, then every configured trust anchor; the first match wins.
    pub fn verify(&self, document: &SamlDocument, expected_id: &str) -> SpResult<XmlSignatureInfo> {
        self.verify_inner(document, expected_id, None)
    }

    /// Verifies the signature on the element carrying `expected_id`
    /// against a specific public key, ignoring the trust list.
    pub fn verify_with_key(
        &self,
        document: &SamlDocument,
        expected_id: &str,
        public_key_der: &[u8],
    ) -> SpResult<XmlSignatureInfo> {
        self.verify_inner(document, expected_id, Some(public_key_der))
    }

    fn verify_inner(
        &self,
        document: &SamlDocument,
        expected_id: &str,
        explicit_key: Option<&[u8]>,
    ) -> SpResult<XmlSignatureInfo> {
        if !document.preserves_whitespace() {
            return Err(SpError::SignatureInvalid(
                "document was parsed without whitespace preservation".to_string(),
            ));
        }
        let doc = document.as_str();

        let element_start = xml::find_element_with_id(doc, expected_id).ok_or_else(|| {
            SpError::SignatureInvalid(format!("signed element '{expected_id}' not found"))
        })?;
        let element = xml::extract_element_at(doc, element_start).ok_or_else(|| {
            SpError::SignatureInvalid(format!("signed element '{expected_id}' is not closed"))
        })?;

        let signature_xml = xml::extract_element(&element, "Signature").ok_or_else(|| {
            SpError::SignatureInvalid("no Signature element present".to_string())
        })?;
        let info = parse_signature(&signature_xml)?;

        // Reference check: an empty URI signs the whole document; a
        // fragment must name the element being verified. Anything else is
        // a wrapping attempt.
        let digest_target = if info.reference_uri.is_empty() {
            xml::remove_element(doc, "Signature")
        } else {
            let reference_id = info.reference_uri.strip_prefix('#').ok_or_else(|| {
                SpError::SignatureInvalid(format!(
                    "non-fragment signature reference '{}'",
                    info.reference_uri
                ))
            })?;
            let own_id = element_id(&element).unwrap_or_default();
            if reference_id != expected_id || reference_id != own_id {
                return Err(SpError::SignatureInvalid(format!(
                    "signature reference '{}' does not match signed element '{}'",
                    info.reference_uri, own_id
                )));
            }
            xml::remove_element(&element, "Signature")
        };

        let digest = hash::hash(info.algorithm.digest, canonicalize(&digest_target).as_bytes());
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(&digest);
        if digest_b64 != info.digest_value {
            return Err(SpError::SignatureInvalid("digest value mismatch".to_string()));
        }

        let signed_info = build_signed_info(&info.reference_uri, &info.digest_value, info.algorithm);
        let canonical_signed_info = canonicalize(&signed_info);
        let signature_bytes = base64::engine::general_purpose::STANDARD
            .decode(&info.signature_value)
            .map_err(|e| SpError::SignatureInvalid(format!("invalid signature encoding: {e}")))?;

        self.check_signature(
            info.algorithm,
            canonical_signed_info.as_bytes(),
            &signature_bytes,
            info.x509_certificate.as_deref(),
            explicit_key,
        )?;

        tracing::debug!(reference = %info.reference_uri, "XML signature verified");
        Ok(info)
    }

    /// Verifies a detached HTTP-Redirect query signature.
    ///
    /// `signed_query` is the canonical byte sequence
    /// `SAMLRequest=..&RelayState=..&SigAlg=..`; `sig_alg_uri` names the
    /// algorithm and an unrecognized URI is rejected by name.
    pub fn verify_redirect_query(
        &self,
        signed_query: &str,
        signature_b64: &str,
        sig_alg_uri: &str,
    ) -> SpResult<()> {
        let algorithm = SigningAlgorithm::from_uri(sig_alg_uri).ok_or_else(|| {
            SpError::SignatureInvalid(format!("unknown signature algorithm: {sig_alg_uri}"))
        })?;
        let signature = base64::engine::general_purpose::STANDARD
            .decode(signature_b64)
            .map_err(|e| SpError::SignatureInvalid(format!("invalid signature encoding: {e}")))?;

        self.check_signature(algorithm, signed_query.as_bytes(), &signature, None, None)
    }

    fn check_signature(
        &self,
        algorithm: SigningAlgorithm,
        data: &[u8],
        signature: &[u8],
        embedded_cert_b64: Option<&str>,
        explicit_key: Option<&[u8]>,
    ) -> SpResult<()> {
        if let Some(key) = explicit_key {
            if algorithm.verify(&verification_key(key), data, signature)? {
                return Ok(());
            }
            return Err(SpError::SignatureInvalid(
                "signature does not verify against the supplied key".to_string(),
            ));
        }

        // Embedded certificate, only when it is a configured trust anchor.
        if let Some(cert_b64) = embedded_cert_b64 {
            let stripped: String = cert_b64.chars().filter(|c| !c.is_whitespace()).collect();
            if let Ok(cert_der) = base64::engine::general_purpose::STANDARD.decode(stripped) {
                if self.trusted_keys.iter().any(|trusted| trusted == &cert_der)
                    && algorithm.verify(&verification_key(&cert_der), data, signature)?
                {
                    return Ok(());
                }
            }
        }

        for trusted in &self.trusted_keys {
            if algorithm.verify(&verification_key(trusted), data, signature)? {
                return Ok(());
            }
        }

        Err(SpError::SignatureInvalid(
            "signature does not verify against any trusted certificate".to_string(),
        ))
    }
}

/// Normalizes a trust anchor to a verification key: X.509 certificates
/// yield their `SubjectPublicKeyInfo`, anything else is used as-is.
fn verification_key(der: &[u8]) -> Vec<u8> {
    pem::certificate_public_key(der).unwrap_or_else(|_| der.to_vec())
}

/// Reads the ID attribute of the element at the start of `element`,
/// accepting the non-standard capitalizations SAML uses.
fn element_id(element: &str) -> Option<String> {
    for attr in ["ID", "Id", "id"] {
        if let Some(value) = xml::attribute_at(element, 0, attr) {
            return Some(value);
        }
    }
    None
}

/// Parses the fields of a `<ds:Signature>` element.
fn parse_signature(signature_xml: &str) -> SpResult<XmlSignatureInfo> {
    let algorithm_uri = xml::element_attribute(signature_xml, "SignatureMethod", "Algorithm")
        .ok_or_else(|| SpError::SignatureInvalid("no SignatureMethod algorithm".to_string()))?;
    let algorithm = SigningAlgorithm::from_uri(&algorithm_uri).ok_or_else(|| {
        SpError::SignatureInvalid(format!("unknown signature algorithm: {algorithm_uri}"))
    })?;

    let reference_uri = xml::element_attribute(signature_xml, "Reference", "URI")
        .ok_or_else(|| SpError::SignatureInvalid("no Reference URI".to_string()))?;

    let digest_value = xml::element_text(signature_xml, "DigestValue")
        .ok_or_else(|| SpError::SignatureInvalid("no DigestValue".to_string()))?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let signature_value = xml::element_text(signature_xml, "SignatureValue")
        .ok_or_else(|| SpError::SignatureInvalid("no SignatureValue".to_string()))?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let x509_certificate = xml::element_text(signature_xml, "X509Certificate");

    Ok(XmlSignatureInfo {
        algorithm,
        reference_uri,
        digest_value,
        signature_value,
        x509_certificate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::XmlSigner;

    fn key_pair() -> (Vec<u8>, Vec<u8>) {
        use aws_lc_rs::encoding::AsDer;
        use aws_lc_rs::rsa::KeySize;
        use aws_lc_rs::signature::{KeyPair, RsaKeyPair};

        let key = RsaKeyPair::generate(KeySize::Rsa2048).unwrap();
        (
            key.as_der().unwrap().as_ref().to_vec(),
            key.public_key().as_ref().to_vec(),
        )
    }

    const MESSAGE: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_resp123456789abc" Version="2.0"><saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://idp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status></samlp:Response>"#;

    #[test]
    fn sign_then_verify_roundtrip() {
        let (private_der, public_der) = key_pair();
        let signer = XmlSigner::new(private_der, None);
        let signed = signer.sign(MESSAGE, "_resp123456789abc").unwrap();

        let document = SamlDocument::parse(signed).unwrap();
        let verifier = XmlSignatureVerifier::new(vec![public_der]);
        let info = verifier.verify(&document, "_resp123456789abc").unwrap();
        assert_eq!(info.reference_uri, "#_resp123456789abc");
    }

    #[test]
    fn flipped_byte_inside_signed_element_fails() {
        let (private_der, public_der) = key_pair();
        let signer = XmlSigner::new(private_der, None);
        let signed = signer.sign(MESSAGE, "_resp123456789abc").unwrap();

        let tampered = signed.replace("idp.example.com", "idq.example.com");
        let document = SamlDocument::parse(tampered).unwrap();
        let verifier = XmlSignatureVerifier::new(vec![public_der]);
        let err = verifier.verify(&document, "_resp123456789abc").unwrap_err();
        assert!(matches!(err, SpError::SignatureInvalid(_)));
    }

    #[test]
    fn wrong_key_fails() {
        let (private_der, _) = key_pair();
        let (_, other_public) = key_pair();
        let signer = XmlSigner::new(private_der, None);
        let signed = signer.sign(MESSAGE, "_resp123456789abc").unwrap();

        let document = SamlDocument::parse(signed).unwrap();
        let verifier = XmlSignatureVerifier::new(vec![other_public]);
        assert!(verifier.verify(&document, "_resp123456789abc").is_err());
    }

    #[test]
    fn collapsed_parse_is_a_fatal_precondition() {
        let (private_der, public_der) = key_pair();
        let signer = XmlSigner::new(private_der, None);
        let signed = signer.sign(MESSAGE, "_resp123456789abc").unwrap();

        let document = SamlDocument::parse_collapsed(signed).unwrap();
        let verifier = XmlSignatureVerifier::new(vec![public_der]);
        let err = verifier.verify(&document, "_resp123456789abc").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn wrapped_reference_is_rejected() {
        let (private_der, public_der) = key_pair();
        let signer = XmlSigner::new(private_der, None);
        let signed = signer.sign(MESSAGE, "_resp123456789abc").unwrap();

        // Point the reference at a different identifier than the element's
        // own ID.
        let wrapped = signed.replace(
            r##"URI="#_resp123456789abc""##,
            r##"URI="#_wrong12345678901""##,
        );
        let document = SamlDocument::parse(wrapped).unwrap();
        let verifier = XmlSignatureVerifier::new(vec![public_der]);
        let err = verifier.verify(&document, "_resp123456789abc").unwrap_err();
        assert!(matches!(err, SpError::SignatureInvalid(ref msg) if msg.contains("reference")));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let (_, public_der) = key_pair();
        let document = SamlDocument::parse(MESSAGE).unwrap();
        let verifier = XmlSignatureVerifier::new(vec![public_der]);
        let err = verifier.verify(&document, "_resp123456789abc").unwrap_err();
        assert!(err.to_string().contains("no Signature"));
    }

    #[test]
    fn redirect_query_signature_roundtrip() {
        let (private_der, public_der) = key_pair();
        let signer = XmlSigner::new(private_der, None);
        let verifier = XmlSignatureVerifier::new(vec![public_der]);
        let algorithm = crate::signature::SignatureConfig::default().algorithm;

        let encoded = "ZGVmbGF0ZWQ=";
        let signature = signer
            .sign_redirect_query(encoded, Some("state"), crate::types::SamlMessageType::Request)
            .unwrap();

        let signed_query = format!(
            "SAMLRequest={}&RelayState=state&SigAlg={}",
            urlencoding::encode(encoded),
            urlencoding::encode(algorithm.uri()),
        );
        assert!(verifier.verify_redirect_query(&signed_query, &signature, algorithm.uri()).is_ok());

        // Altering RelayState after signing breaks the signature.
        let altered = signed_query.replace("RelayState=state", "RelayState=evil");
        assert!(verifier.verify_redirect_query(&altered, &signature, algorithm.uri()).is_err());
    }

    #[test]
    fn unknown_sig_alg_is_named_in_the_error() {
        let verifier = XmlSignatureVerifier::new(Vec::new());
        let err = verifier
            .verify_redirect_query("SAMLRequest=x", "c2ln", "urn:bogus:alg")
            .unwrap_err();
        assert!(err.to_string().contains("urn:bogus:alg"));
    }
}
