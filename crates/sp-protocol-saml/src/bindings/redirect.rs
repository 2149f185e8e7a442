//! HTTP-Redirect binding.
//!
//! Outbound messages are raw-DEFLATE compressed, Base64 encoded, and
//! URL-encoded into query parameters; the detached signature covers the
//! exact byte sequence `SAMLRequest=..&RelayState=..&SigAlg=..` in that
//! parameter order, with RelayState omitted when absent.

use std::io::{Read, Write};

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{SpError, SpResult};
use crate::signature::{XmlSignatureVerifier, XmlSigner};
use crate::types::SamlMessageType;

use super::{BindingOutcome, DecodedMessage};

/// Query parameters of an inbound redirect-binding envelope.
///
/// Values are percent-decoded exactly once.
#[derive(Debug, Clone, Default)]
pub struct RedirectParams {
    /// The `SAMLRequest` parameter, if present.
    pub saml_request: Option<String>,
    /// The `SAMLResponse` parameter, if present.
    pub saml_response: Option<String>,
    /// The `RelayState` parameter, if present.
    pub relay_state: Option<String>,
    /// The `SigAlg` parameter, if present.
    pub sig_alg: Option<String>,
    /// The `Signature` parameter, if present.
    pub signature: Option<String>,
}

impl RedirectParams {
    /// Extracts redirect-binding parameters from a full URL.
    pub fn from_url(url: &str) -> SpResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SpError::Format(format!("invalid URL: {e}")))?;

        let mut params = Self::default();
        for (key, value) in parsed.query_pairs() {
            let value = value.to_string();
            match key.as_ref() {
                "SAMLRequest" => params.saml_request = Some(value),
                "SAMLResponse" => params.saml_response = Some(value),
                "RelayState" => params.relay_state = Some(value),
                "SigAlg" => params.sig_alg = Some(value),
                "Signature" => params.signature = Some(value),
                _ => {}
            }
        }
        Ok(params)
    }
}

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes an unsigned SAML request into a redirect URL.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SpResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request, None)
    }

    /// Encodes a signed SAML request into a redirect URL.
    pub fn encode_signed_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        signer: &XmlSigner,
    ) -> SpResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request, Some(signer))
    }

    /// Encodes a signed SAML response into a redirect URL.
    pub fn encode_signed_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        signer: &XmlSigner,
    ) -> SpResult<String> {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response, Some(signer))
    }

    fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        signer: Option<&XmlSigner>,
    ) -> SpResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);

        let mut query = format!(
            "{}={}",
            message_type.query_param(),
            urlencoding::encode(&encoded)
        );
        if let Some(rs) = relay_state {
            query.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }

        if let Some(signer) = signer {
            let signature = signer.sign_redirect_query(&encoded, relay_state, message_type)?;
            query.push_str(&format!(
                "&SigAlg={}",
                urlencoding::encode(signer.algorithm().uri())
            ));
            query.push_str(&format!("&Signature={}", urlencoding::encode(&signature)));
        }

        let separator = if destination.contains('?') { '&' } else { '?' };
        Ok(format!("{destination}{separator}{query}"))
    }

    /// Decodes and signature-verifies an inbound redirect envelope.
    ///
    /// Returns [`BindingOutcome::NotApplicable`] when the expected message
    /// parameter is absent. A missing or invalid query signature rejects
    /// the envelope.
    #[must_use]
    pub fn decode(
        params: &RedirectParams,
        expected: SamlMessageType,
        verifier: &XmlSignatureVerifier,
    ) -> BindingOutcome<DecodedMessage> {
        let Some(encoded) = Self::message_param(params, expected) else {
            return BindingOutcome::NotApplicable;
        };

        let (Some(sig_alg), Some(signature)) = (&params.sig_alg, &params.signature) else {
            return BindingOutcome::Rejected(SpError::SignatureInvalid(
                "redirect envelope carries no query signature".to_string(),
            ));
        };

        let signed_query = Self::signed_query(encoded, params.relay_state.as_deref(), sig_alg, expected);
        if let Err(err) = verifier.verify_redirect_query(&signed_query, signature, sig_alg) {
            tracing::warn!("redirect query signature rejected: {err}");
            return BindingOutcome::Rejected(err);
        }

        match Self::inflate_message(encoded, params.relay_state.as_deref(), expected) {
            Ok(message) => BindingOutcome::Accepted(message),
            Err(err) => BindingOutcome::Rejected(err),
        }
    }

    /// Decodes an inbound redirect envelope without verifying a query
    /// signature. Used for messages whose authenticity is established at
    /// another layer, such as an enveloped XML signature.
    #[must_use]
    pub fn decode_unverified(
        params: &RedirectParams,
        expected: SamlMessageType,
    ) -> BindingOutcome<DecodedMessage> {
        let Some(encoded) = Self::message_param(params, expected) else {
            return BindingOutcome::NotApplicable;
        };
        match Self::inflate_message(encoded, params.relay_state.as_deref(), expected) {
            Ok(message) => BindingOutcome::Accepted(message),
            Err(err) => BindingOutcome::Rejected(err),
        }
    }

    fn message_param(params: &RedirectParams, expected: SamlMessageType) -> Option<&String> {
        match expected {
            SamlMessageType::Request => params.saml_request.as_ref(),
            SamlMessageType::Response => params.saml_response.as_ref(),
        }
    }

    /// Rebuilds the canonical signed byte sequence from received
    /// parameters.
    fn signed_query(
        encoded: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
        message_type: SamlMessageType,
    ) -> String {
        let mut query = format!(
            "{}={}",
            message_type.query_param(),
            urlencoding::encode(encoded)
        );
        if let Some(rs) = relay_state {
            query.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }
        query.push_str(&format!("&SigAlg={}", urlencoding::encode(sig_alg)));
        query
    }

    fn inflate_message(
        encoded: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SpResult<DecodedMessage> {
        let compressed = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let xml_bytes = deflate_decompress(&compressed)?;
        let xml = String::from_utf8(xml_bytes)
            .map_err(|e| SpError::Format(format!("message is not valid UTF-8: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
        })
    }
}

/// Compresses data using raw DEFLATE (no zlib header).
fn deflate_compress(data: &[u8]) -> SpResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses raw DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SpResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer_and_verifier() -> (XmlSigner, XmlSignatureVerifier) {
        use aws_lc_rs::encoding::AsDer;
        use aws_lc_rs::rsa::KeySize;
        use aws_lc_rs::signature::{KeyPair, RsaKeyPair};

        let key = RsaKeyPair::generate(KeySize::Rsa2048).unwrap();
        let signer = XmlSigner::new(key.as_der().unwrap().as_ref().to_vec(), None);
        let verifier = XmlSignatureVerifier::new(vec![key.public_key().as_ref().to_vec()]);
        (signer, verifier)
    }

    const XML: &str = r#"<samlp:AuthnRequest ID="_req1">content</samlp:AuthnRequest>"#;

    #[test]
    fn signed_roundtrip_recovers_message_and_relay_state() {
        let (signer, verifier) = signer_and_verifier();
        let url = HttpRedirectBinding::encode_signed_request(
            XML,
            "https://idp.example.com/sso",
            Some("state-123"),
            &signer,
        )
        .unwrap();

        assert!(url.starts_with("https://idp.example.com/sso?SAMLRequest="));
        assert!(url.contains("&SigAlg="));
        assert!(url.contains("&Signature="));

        let params = RedirectParams::from_url(&url).unwrap();
        let decoded = HttpRedirectBinding::decode(&params, SamlMessageType::Request, &verifier)
            .require("redirect binding")
            .unwrap();

        assert_eq!(decoded.xml, XML);
        assert_eq!(decoded.relay_state.as_deref(), Some("state-123"));
    }

    #[test]
    fn altered_relay_state_fails_verification() {
        let (signer, verifier) = signer_and_verifier();
        let url = HttpRedirectBinding::encode_signed_request(
            XML,
            "https://idp.example.com/sso",
            Some("good"),
            &signer,
        )
        .unwrap();

        let tampered = url.replace("RelayState=good", "RelayState=evil");
        let params = RedirectParams::from_url(&tampered).unwrap();
        let outcome = HttpRedirectBinding::decode(&params, SamlMessageType::Request, &verifier);
        assert!(matches!(outcome, BindingOutcome::Rejected(SpError::SignatureInvalid(_))));
    }

    #[test]
    fn missing_parameter_set_is_not_applicable() {
        let (_, verifier) = signer_and_verifier();
        let params = RedirectParams::from_url("https://sp.example.com/acs?foo=bar").unwrap();
        let outcome = HttpRedirectBinding::decode(&params, SamlMessageType::Response, &verifier);
        assert!(outcome.is_not_applicable());
    }

    #[test]
    fn missing_signature_is_rejected_not_inert() {
        let (_, verifier) = signer_and_verifier();
        let url =
            HttpRedirectBinding::encode_request(XML, "https://idp.example.com/sso", None).unwrap();
        let params = RedirectParams::from_url(&url).unwrap();
        let outcome = HttpRedirectBinding::decode(&params, SamlMessageType::Request, &verifier);
        assert!(matches!(outcome, BindingOutcome::Rejected(SpError::SignatureInvalid(_))));
    }

    #[test]
    fn unsigned_decode_roundtrip() {
        let url = HttpRedirectBinding::encode_request(
            XML,
            "https://idp.example.com/sso?existing=1",
            None,
        )
        .unwrap();
        assert!(url.contains("?existing=1&SAMLRequest="));

        let params = RedirectParams::from_url(&url).unwrap();
        let decoded = HttpRedirectBinding::decode_unverified(&params, SamlMessageType::Request)
            .require("redirect binding")
            .unwrap();
        assert_eq!(decoded.xml, XML);
    }

    #[test]
    fn deflate_roundtrip() {
        let compressed = deflate_compress(b"some payload bytes").unwrap();
        let decompressed = deflate_decompress(&compressed).unwrap();
        assert_eq!(decompressed, b"some payload bytes");
    }
}
