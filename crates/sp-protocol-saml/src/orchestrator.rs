//! Protocol orchestration.
//!
//! [`ServiceProvider`] is the public façade over the message factory, the
//! bindings, the decryptor, and the validator. It holds no mutable state:
//! each round trip is keyed by the correlation entry in the external
//! store, and concurrent round trips for different sessions never touch
//! each other.
//!
//! Correlation is consumed only after a response validates; a rejected or
//! transport-failed round trip leaves the entry for the store's own
//! lifetime policy.

use crate::bindings::{HttpArtifactBinding, HttpRedirectBinding, RedirectParams};
use crate::config::SpConfiguration;
use crate::error::{SpError, SpResult};
use crate::signature::{SignatureConfig, XmlSignatureVerifier, XmlSigner};
use crate::state::{CertificatePair, CertificateProvider, CorrelationStore, PendingCorrelation};
use crate::types::{status_codes, MessageFactory, NameId, SamlMessageType, ValidatedAssertion};
use crate::validator::ResponseValidator;
use crate::xml::{self, SamlDocument};

/// The service-provider side of the SAML Web Browser SSO and Single
/// Logout profiles.
pub struct ServiceProvider<C, S> {
    config: SpConfiguration,
    certificate_provider: C,
    correlation_store: S,
    artifact_binding: HttpArtifactBinding,
}

impl<C, S> ServiceProvider<C, S>
where
    C: CertificateProvider,
    S: CorrelationStore,
{
    /// Creates a service provider over a resolved configuration and the
    /// host-supplied capabilities.
    pub fn new(
        config: SpConfiguration,
        certificate_provider: C,
        correlation_store: S,
    ) -> SpResult<Self> {
        Ok(Self {
            config,
            certificate_provider,
            correlation_store,
            artifact_binding: HttpArtifactBinding::new()?,
        })
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &SpConfiguration {
        &self.config
    }

    /// Starts an SSO round trip: builds a signed AuthnRequest, persists
    /// the correlation, and returns the redirect URL for the browser.
    pub async fn initiate_sso(
        &self,
        request_id: &str,
        relay_state: Option<&str>,
    ) -> SpResult<String> {
        let factory = MessageFactory::new(&self.config);
        let request = factory.authn_request(request_id)?;
        let (signer, _) = self.signer().await?;

        let url = HttpRedirectBinding::encode_signed_request(
            &request.to_xml(),
            &self.config.idp_sso_url,
            relay_state,
            &signer,
        )?;

        self.correlation_store
            .save(PendingCorrelation::new(request_id, relay_state))
            .await?;
        tracing::info!(%request_id, "SSO round trip initiated");
        Ok(url)
    }

    /// Receives an SSO response, trying the Redirect binding and then the
    /// Artifact binding. Returns `None` when neither binding recognizes
    /// the envelope.
    pub async fn receive_sso_response(&self, url: &str) -> SpResult<Option<ValidatedAssertion>> {
        let certs = self.certificate_provider.certificates().await?;
        let verifier = XmlSignatureVerifier::new(vec![certs.idp_certificate_der.clone()]);

        let params = RedirectParams::from_url(url)?;
        match HttpRedirectBinding::decode(&params, SamlMessageType::Response, &verifier)
            .into_result()?
        {
            Some(decoded) => return self.finish_sso(&decoded.xml, &certs).await.map(Some),
            None => {}
        }

        match HttpArtifactBinding::extract(url).into_result()? {
            Some((artifact, _relay_state)) => {
                self.resolve_and_finish(&artifact, &certs).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Receives an SSO response via the HTTP-Redirect binding.
    pub async fn receive_redirect_response(&self, url: &str) -> SpResult<ValidatedAssertion> {
        let certs = self.certificate_provider.certificates().await?;
        let verifier = XmlSignatureVerifier::new(vec![certs.idp_certificate_der.clone()]);

        let params = RedirectParams::from_url(url)?;
        let decoded = HttpRedirectBinding::decode(&params, SamlMessageType::Response, &verifier)
            .require("redirect binding")?;
        self.finish_sso(&decoded.xml, &certs).await
    }

    /// Receives an SSO response via the HTTP-Artifact binding: extracts
    /// the artifact, resolves it at the IdP, and validates the inner
    /// response. A resolution failure leaves the correlation untouched.
    pub async fn receive_artifact_response(&self, url: &str) -> SpResult<ValidatedAssertion> {
        let certs = self.certificate_provider.certificates().await?;
        let (artifact, _relay_state) =
            HttpArtifactBinding::extract(url).require("artifact binding")?;
        self.resolve_and_finish(&artifact, &certs).await
    }

    /// Starts an SLO round trip for the current principal.
    pub async fn initiate_slo(
        &self,
        request_id: &str,
        name_id: NameId,
        session_index: Option<&str>,
        relay_state: Option<&str>,
    ) -> SpResult<String> {
        let factory = MessageFactory::new(&self.config);
        let request = factory.logout_request(request_id, name_id, session_index)?;
        let (signer, _) = self.signer().await?;

        let url = HttpRedirectBinding::encode_signed_request(
            &request.to_xml(),
            &self.config.idp_slo_url,
            relay_state,
            &signer,
        )?;

        self.correlation_store
            .save(PendingCorrelation::new(request_id, relay_state))
            .await?;
        tracing::info!(%request_id, "SLO round trip initiated");
        Ok(url)
    }

    /// Receives the IdP's response to an SP-initiated logout. Verifies
    /// status and correlation, clears the correlation, and reports
    /// whether the IdP confirmed the logout.
    pub async fn receive_sp_logout_response(&self, url: &str) -> SpResult<bool> {
        let certs = self.certificate_provider.certificates().await?;
        let verifier = XmlSignatureVerifier::new(vec![certs.idp_certificate_der.clone()]);

        let params = RedirectParams::from_url(url)?;
        let decoded = HttpRedirectBinding::decode(&params, SamlMessageType::Response, &verifier)
            .require("redirect binding")?;

        let correlation = self
            .correlation_store
            .load()
            .await?
            .ok_or_else(|| SpError::Replay("no outstanding logout request".to_string()))?;
        let in_response_to = xml::root_attribute(&decoded.xml, "InResponseTo")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SpError::Replay("logout response carries no InResponseTo".to_string()))?;
        if in_response_to != correlation.request_id {
            return Err(SpError::Replay(format!(
                "logout response correlates to '{in_response_to}', expected '{}'",
                correlation.request_id
            )));
        }

        let status = xml::element_attribute(&decoded.xml, "StatusCode", "Value")
            .ok_or_else(|| SpError::MissingElement("StatusCode".to_string()))?;
        if status != status_codes::SUCCESS {
            tracing::warn!(%status, "IdP reported logout failure");
            return Ok(false);
        }

        self.correlation_store.remove().await?;
        tracing::info!("SP-initiated logout completed");
        Ok(true)
    }

    /// Handles an IdP-initiated logout request: validates the issuer and
    /// returns the redirect URL carrying the signed LogoutResponse. No
    /// correlation state is involved, since the IdP initiated the round
    /// trip.
    pub async fn receive_idp_logout_request(&self, url: &str) -> SpResult<String> {
        let certs = self.certificate_provider.certificates().await?;
        let params = RedirectParams::from_url(url)?;

        // Verify the query signature when the IdP sent one.
        let decoded = if params.signature.is_some() {
            let verifier = XmlSignatureVerifier::new(vec![certs.idp_certificate_der.clone()]);
            HttpRedirectBinding::decode(&params, SamlMessageType::Request, &verifier)
        } else {
            HttpRedirectBinding::decode_unverified(&params, SamlMessageType::Request)
        }
        .require("redirect binding")?;

        let issuer = xml::element_text(&decoded.xml, "Issuer")
            .ok_or_else(|| SpError::MissingElement("Issuer".to_string()))?;
        if issuer != self.config.idp_entity_id {
            return Err(SpError::IssuerMismatch {
                expected: self.config.idp_entity_id.clone(),
                actual: issuer,
            });
        }

        let request_id = xml::root_attribute(&decoded.xml, "ID")
            .ok_or_else(|| SpError::MissingElement("LogoutRequest ID".to_string()))?;

        let factory = MessageFactory::new(&self.config);
        let response = factory.logout_response(&request_id);
        let (signer, _) = self.signer().await?;

        let url = HttpRedirectBinding::encode_signed_response(
            &response.to_xml(),
            &self.config.idp_slo_url,
            decoded.relay_state.as_deref(),
            &signer,
        )?;
        tracing::info!(%request_id, "answering IdP-initiated logout");
        Ok(url)
    }

    async fn signer(&self) -> SpResult<(XmlSigner, CertificatePair)> {
        let certs = self.certificate_provider.certificates().await?;
        let certificate = if certs.sp_certificate_der.is_empty() {
            None
        } else {
            Some(certs.sp_certificate_der.clone())
        };
        let signer = XmlSigner::new(certs.sp_private_key_der.clone(), certificate)
            .with_config(SignatureConfig::with_algorithm(self.config.signature_algorithm));
        Ok((signer, certs))
    }

    async fn resolve_and_finish(
        &self,
        artifact: &str,
        certs: &CertificatePair,
    ) -> SpResult<ValidatedAssertion> {
        // Enforce the artifact format before going to the network.
        crate::artifact::Artifact::decode(artifact)?;

        let (signer, _) = self.signer().await?;
        let response_xml = self
            .artifact_binding
            .resolve(
                artifact,
                &self.config.artifact_resolution_url,
                &self.config.sp_entity_id,
                &signer,
            )
            .await?
            .ok_or_else(|| {
                SpError::Format("artifact resolution returned no Response payload".to_string())
            })?;
        self.finish_sso(&response_xml, certs).await
    }

    /// Validates a decoded response and consumes the correlation.
    /// Validation failures propagate before the correlation is touched.
    async fn finish_sso(
        &self,
        response_xml: &str,
        certs: &CertificatePair,
    ) -> SpResult<ValidatedAssertion> {
        let correlation = self
            .correlation_store
            .load()
            .await?
            .ok_or_else(|| SpError::Replay("no outstanding request for this session".to_string()))?;

        let document = SamlDocument::parse(response_xml)?;
        let validator = ResponseValidator::new(&self.config, certs);
        let assertion = validator.validate(&document, &correlation.request_id)?;

        self.correlation_store.remove().await?;
        Ok(assertion)
    }
}
