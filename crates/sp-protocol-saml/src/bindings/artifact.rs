//! HTTP-Artifact binding.
//!
//! The browser carries only a 44-byte artifact reference; the SP resolves
//! it to the real message with a signed, SOAP-style ArtifactResolve POST
//! to the IdP's resolution service. The resolve call is timeout-bounded
//! and never retried: replaying a resolve without idempotency guarantees
//! risks duplicate-artifact resolution at the IdP.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};

use sp_crypto::random;

use crate::artifact::Artifact;
use crate::error::{SpError, SpResult};
use crate::signature::XmlSigner;
use crate::types::{status_codes, SOAP_ENV_NS};
use crate::xml::{self, xml_escape};

use super::BindingOutcome;

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-Artifact binding: artifact issuance and resolution.
pub struct HttpArtifactBinding {
    client: reqwest::Client,
}

impl HttpArtifactBinding {
    /// Creates a binding with the default resolve timeout.
    pub fn new() -> SpResult<Self> {
        Self::with_timeout(DEFAULT_RESOLVE_TIMEOUT)
    }

    /// Creates a binding with a custom resolve timeout.
    pub fn with_timeout(timeout: Duration) -> SpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SpError::Configuration(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { client })
    }

    /// Builds the redirect URL carrying a `SAMLart` parameter.
    #[must_use]
    pub fn encode_redirect(
        artifact: &Artifact,
        destination: &str,
        relay_state: Option<&str>,
    ) -> String {
        let separator = if destination.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{destination}{separator}SAMLart={}",
            urlencoding::encode(&artifact.encode())
        );
        if let Some(rs) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }
        url
    }

    /// Extracts the `SAMLart` parameter from an inbound URL.
    ///
    /// Returns [`BindingOutcome::NotApplicable`] when the parameter is
    /// absent.
    #[must_use]
    pub fn extract(url: &str) -> BindingOutcome<(String, Option<String>)> {
        let parsed = match url::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return BindingOutcome::Rejected(SpError::Format(format!("invalid URL: {e}"))),
        };

        let mut artifact = None;
        let mut relay_state = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "SAMLart" => artifact = Some(value.to_string()),
                "RelayState" => relay_state = Some(value.to_string()),
                _ => {}
            }
        }

        match artifact {
            Some(artifact) => BindingOutcome::Accepted((artifact, relay_state)),
            None => BindingOutcome::NotApplicable,
        }
    }

    /// Resolves an artifact to the message it references.
    ///
    /// POSTs a signed ArtifactResolve envelope to `endpoint`. A
    /// non-success envelope status is a fatal protocol error naming the
    /// status code; a payload whose local name is not `Response` yields
    /// `None`. Transport failures surface as [`SpError::Transport`] and
    /// are never retried here.
    pub async fn resolve(
        &self,
        encoded_artifact: &str,
        endpoint: &str,
        issuer: &str,
        signer: &XmlSigner,
    ) -> SpResult<Option<String>> {
        let resolve_id = random::generate_request_id();
        let resolve_xml = build_artifact_resolve(&resolve_id, issuer, endpoint, encoded_artifact);
        let signed = signer.sign(&resolve_xml, &resolve_id)?;
        let envelope = format!(
            r#"<soap-env:Envelope xmlns:soap-env="{SOAP_ENV_NS}"><soap-env:Body>{signed}</soap-env:Body></soap-env:Envelope>"#
        );

        tracing::debug!(%endpoint, "resolving SAML artifact");
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "http://www.oasis-open.org/committees/security")
            .body(envelope)
            .send()
            .await
            .map_err(|e| SpError::Transport(format!("artifact resolve call failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpError::Transport(format!(
                "artifact resolve endpoint returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SpError::Transport(format!("artifact resolve body read failed: {e}")))?;
        parse_artifact_response(&body)
    }
}

fn build_artifact_resolve(
    resolve_id: &str,
    issuer: &str,
    destination: &str,
    encoded_artifact: &str,
) -> String {
    format!(
        r#"<samlp:ArtifactResolve xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{}" Version="2.0" IssueInstant="{}" Destination="{}"><saml:Issuer>{}</saml:Issuer><samlp:Artifact>{}</samlp:Artifact></samlp:ArtifactResolve>"#,
        xml_escape(resolve_id),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        xml_escape(destination),
        xml_escape(issuer),
        xml_escape(encoded_artifact),
    )
}

/// Parses an ArtifactResponse envelope, returning the inner `Response`
/// element when present.
fn parse_artifact_response(body: &str) -> SpResult<Option<String>> {
    let artifact_response = xml::extract_element(body, "ArtifactResponse")
        .ok_or_else(|| SpError::MissingElement("ArtifactResponse".to_string()))?;

    let status_code = xml::element_attribute(&artifact_response, "StatusCode", "Value")
        .ok_or_else(|| SpError::MissingElement("ArtifactResponse StatusCode".to_string()))?;
    if status_code != status_codes::SUCCESS {
        return Err(SpError::Status { code: status_code });
    }

    Ok(xml::extract_element(&artifact_response, "Response"))
}
