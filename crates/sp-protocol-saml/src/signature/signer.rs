//! XML signature creation.

use base64::Engine;

use sp_crypto::{hash, pem};

use crate::error::{SpError, SpResult};
use crate::types::SamlMessageType;
use crate::xml;

use super::{build_signed_info, canonicalize, SignatureConfig};

/// Signs SAML elements with the SP private key.
pub struct XmlSigner {
    private_key_der: Vec<u8>,
    certificate_der: Option<Vec<u8>>,
    config: SignatureConfig,
}

impl XmlSigner {
    /// Creates a signer from DER key material.
    #[must_use]
    pub fn new(private_key_der: Vec<u8>, certificate_der: Option<Vec<u8>>) -> Self {
        Self {
            private_key_der,
            certificate_der,
            config: SignatureConfig::default(),
        }
    }

    /// Creates a signer from PEM-encoded key and certificate.
    pub fn from_pem(private_key_pem: &str, certificate_pem: Option<&str>) -> SpResult<Self> {
        let private_key_der = pem::private_key_from_pem(private_key_pem)?;
        let certificate_der = match certificate_pem {
            Some(cert) => Some(pem::certificate_from_pem(cert)?),
            None => None,
        };
        Ok(Self::new(private_key_der, certificate_der))
    }

    /// Sets the signature configuration.
    #[must_use]
    pub const fn with_config(mut self, config: SignatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configured signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> sp_crypto::SigningAlgorithm {
        self.config.algorithm
    }

    /// Signs the element carrying `reference_id`, in place.
    ///
    /// The enveloped `<ds:Signature>` is inserted as the sibling
    /// immediately following the element's `<Issuer>` child, per the SAML
    /// schema ordering for protocol messages and assertions.
    pub fn sign(&self, document: &str, reference_id: &str) -> SpResult<String> {
        let element_start = xml::find_element_with_id(document, reference_id).ok_or_else(|| {
            SpError::SignatureCreation(format!("element with ID '{reference_id}' not found"))
        })?;
        let element = xml::extract_element_at(document, element_start).ok_or_else(|| {
            SpError::SignatureCreation(format!("element with ID '{reference_id}' is not closed"))
        })?;

        let digest = hash::hash(self.config.algorithm.digest, canonicalize(&element).as_bytes());
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(&digest);

        let signed_info =
            build_signed_info(&format!("#{reference_id}"), &digest_b64, self.config.algorithm);
        let canonical_signed_info = canonicalize(&signed_info);

        let signature_value = self
            .config
            .algorithm
            .sign(&self.private_key_der, canonical_signed_info.as_bytes())
            .map_err(|e| SpError::SignatureCreation(e.to_string()))?;
        let signature_b64 = base64::engine::general_purpose::STANDARD.encode(&signature_value);

        let signature_element = self.build_signature_element(&signed_info, &signature_b64);

        let insert_at = insert_position(document, element_start, element.len())?;
        Ok(format!(
            "{}{}{}",
            &document[..insert_at],
            signature_element,
            &document[insert_at..]
        ))
    }

    /// Computes the detached signature for an HTTP-Redirect query.
    ///
    /// `encoded_message` is the deflated, base64-encoded message before URL
    /// encoding. The signed byte sequence is
    /// `SAMLRequest=..&RelayState=..&SigAlg=..` in exactly that parameter
    /// order, with RelayState omitted when absent.
    pub fn sign_redirect_query(
        &self,
        encoded_message: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SpResult<String> {
        let mut to_sign = format!(
            "{}={}",
            message_type.query_param(),
            urlencoding::encode(encoded_message)
        );
        if let Some(rs) = relay_state {
            to_sign.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }
        to_sign.push_str(&format!(
            "&SigAlg={}",
            urlencoding::encode(self.config.algorithm.uri())
        ));

        let signature = self
            .config
            .algorithm
            .sign(&self.private_key_der, to_sign.as_bytes())
            .map_err(|e| SpError::SignatureCreation(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(signature))
    }

    fn build_signature_element(&self, signed_info: &str, signature_b64: &str) -> String {
        let mut signature = format!(
            r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
{signed_info}
<ds:SignatureValue>{signature_b64}</ds:SignatureValue>"#
        );

        if self.config.include_certificate {
            if let Some(cert) = self.certificate_der.as_deref() {
                let cert_b64 = base64::engine::general_purpose::STANDARD.encode(cert);
                signature.push_str(&format!(
                    "\n<ds:KeyInfo>\n<ds:X509Data>\n<ds:X509Certificate>{cert_b64}</ds:X509Certificate>\n</ds:X509Data>\n</ds:KeyInfo>"
                ));
            }
        }

        signature.push_str("\n</ds:Signature>");
        signature
    }
}

/// Finds where the signature is inserted: after the element's `<Issuer>`
/// child when present, otherwise directly after the opening tag.
fn insert_position(document: &str, element_start: usize, element_len: usize) -> SpResult<usize> {
    let open_end = document[element_start..]
        .find('>')
        .map(|pos| element_start + pos + 1)
        .ok_or_else(|| SpError::SignatureCreation("malformed element".to_string()))?;

    let element_region = &document[open_end..element_start + element_len];
    for pattern in ["</saml:Issuer>", "</saml2:Issuer>", "</Issuer>"] {
        if let Some(pos) = element_region.find(pattern) {
            return Ok(open_end + pos + pattern.len());
        }
    }
    Ok(open_end)
}
