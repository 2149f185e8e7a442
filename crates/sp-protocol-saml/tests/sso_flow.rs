//! End-to-end SSO flow through the public API: configuration resolution,
//! request issuance, an in-process fake IdP answering over the Redirect
//! binding, and response validation.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};

use sp_protocol_saml::bindings::{HttpRedirectBinding, RedirectParams};
use sp_protocol_saml::signature::XmlSigner;
use sp_protocol_saml::types::SamlMessageType;
use sp_protocol_saml::{
    CertificatePair, CertificateProvider, CorrelationStore, IdentityProviderConfig,
    PendingCorrelation, ServiceProvider, ServiceProviderConfig, SpConfiguration, SpError, SpResult,
};

struct StaticCertificates(CertificatePair);

#[async_trait]
impl CertificateProvider for StaticCertificates {
    async fn certificates(&self) -> SpResult<CertificatePair> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct InMemoryStore(Mutex<Option<PendingCorrelation>>);

#[async_trait]
impl CorrelationStore for InMemoryStore {
    async fn save(&self, correlation: PendingCorrelation) -> SpResult<()> {
        *self.0.lock().unwrap() = Some(correlation);
        Ok(())
    }

    async fn load(&self) -> SpResult<Option<PendingCorrelation>> {
        Ok(self.0.lock().unwrap().clone())
    }

    async fn remove(&self) -> SpResult<()> {
        *self.0.lock().unwrap() = None;
        Ok(())
    }
}

struct FakeIdp {
    private_key_der: Vec<u8>,
    public_key_der: Vec<u8>,
}

impl FakeIdp {
    fn new() -> Self {
        use aws_lc_rs::encoding::AsDer;
        use aws_lc_rs::rsa::KeySize;
        use aws_lc_rs::signature::{KeyPair, RsaKeyPair};

        let key = RsaKeyPair::generate(KeySize::Rsa2048).unwrap();
        Self {
            private_key_der: key.as_der().unwrap().as_ref().to_vec(),
            public_key_der: key.public_key().as_ref().to_vec(),
        }
    }

    /// Answers an AuthnRequest the way a real IdP would over the Redirect
    /// binding: signed assertion, signed query string.
    fn answer(&self, authn_request_xml: &str, acs_url: &str) -> String {
        let in_response_to =
            sp_protocol_saml::xml::root_attribute(authn_request_xml, "ID").unwrap();
        let instant = |at: chrono::DateTime<Utc>| at.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_fakeidpresp12345" Version="2.0" InResponseTo="{in_response_to}"><saml:Issuer>https://idp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status><saml:Assertion ID="_fakeidpassert123" Version="2.0" IssueInstant="{issued}"><saml:Issuer>https://idp.example.com</saml:Issuer><saml:Subject><saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">alice@example.com</saml:NameID></saml:Subject><saml:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_after}"><saml:AudienceRestriction><saml:Audience>https://sp.example.com</saml:Audience></saml:AudienceRestriction></saml:Conditions><saml:AuthnStatement AuthnInstant="{issued}" SessionIndex="_idpsession1"/><saml:AttributeStatement><saml:Attribute Name="displayName"><saml:AttributeValue>Alice</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion></samlp:Response>"#,
            issued = instant(Utc::now()),
            not_before = instant(Utc::now() - Duration::minutes(5)),
            not_after = instant(Utc::now() + Duration::minutes(5)),
        );

        let signer = XmlSigner::new(self.private_key_der.clone(), None);
        let signed = signer.sign(&response, "_fakeidpassert123").unwrap();
        HttpRedirectBinding::encode_signed_response(&signed, acs_url, None, &signer).unwrap()
    }
}

fn resolved_config() -> SpConfiguration {
    let idp = IdentityProviderConfig {
        entity_id: "https://idp.example.com".to_string(),
        sso_url: "https://idp.example.com/sso".to_string(),
        slo_url: "https://idp.example.com/slo".to_string(),
        artifact_resolution_url: "https://idp.example.com/artifact".to_string(),
        signature_algorithm: Some("SHA256".to_string()),
    };
    let sp = ServiceProviderConfig {
        entity_id: "https://sp.example.com".to_string(),
        assertion_consumer_service_url: "https://sp.example.com/acs".to_string(),
        force_authn: false,
        is_passive: false,
        name_id_format: None,
        authn_context_class_refs: Vec::new(),
        authn_context_comparison: None,
        omit_assertion_signature_check: false,
        clock_skew_seconds: Some(120),
        artifact_endpoint_index: None,
    };
    SpConfiguration::resolve(idp, sp).unwrap()
}

fn sp_key() -> Vec<u8> {
    use aws_lc_rs::encoding::AsDer;
    use aws_lc_rs::rsa::KeySize;
    use aws_lc_rs::signature::RsaKeyPair;

    RsaKeyPair::generate(KeySize::Rsa2048)
        .unwrap()
        .as_der()
        .unwrap()
        .as_ref()
        .to_vec()
}

#[tokio::test]
async fn browser_sso_round_trip() {
    let idp = FakeIdp::new();
    let certificates = CertificatePair {
        idp_certificate_der: idp.public_key_der.clone(),
        sp_certificate_der: Vec::new(),
        sp_private_key_der: sp_key(),
    };
    let sp = ServiceProvider::new(
        resolved_config(),
        StaticCertificates(certificates),
        InMemoryStore::default(),
    )
    .unwrap();

    // SP issues the request and redirects the browser.
    let redirect_url = sp.initiate_sso("_flow-request-0001", Some("/dashboard")).await.unwrap();
    assert!(redirect_url.starts_with("https://idp.example.com/sso?SAMLRequest="));

    // The IdP decodes the request out of the redirect URL.
    let params = RedirectParams::from_url(&redirect_url).unwrap();
    let decoded = HttpRedirectBinding::decode_unverified(&params, SamlMessageType::Request)
        .require("redirect binding")
        .unwrap();
    assert!(decoded.xml.contains("https://sp.example.com/acs"));
    assert_eq!(decoded.relay_state.as_deref(), Some("/dashboard"));

    // The IdP answers; the SP validates end to end.
    let response_url = idp.answer(&decoded.xml, "https://sp.example.com/acs");
    let assertion = sp.receive_redirect_response(&response_url).await.unwrap();

    assert_eq!(assertion.issuer, "https://idp.example.com");
    assert_eq!(assertion.name_id.value, "alice@example.com");
    assert_eq!(assertion.session_index.as_deref(), Some("_idpsession1"));
    assert_eq!(assertion.attribute_value("displayName"), Some("Alice"));
    assert!(assertion.signed);

    // The correlation is consumed: replaying the response is rejected.
    let replay = sp.receive_redirect_response(&response_url).await.unwrap_err();
    assert!(matches!(replay, SpError::Replay(_)));
}

#[tokio::test]
async fn tampered_response_is_rejected_without_consuming_correlation() {
    let idp = FakeIdp::new();
    let certificates = CertificatePair {
        idp_certificate_der: idp.public_key_der.clone(),
        sp_certificate_der: Vec::new(),
        sp_private_key_der: sp_key(),
    };
    let sp = ServiceProvider::new(
        resolved_config(),
        StaticCertificates(certificates),
        InMemoryStore::default(),
    )
    .unwrap();

    let redirect_url = sp.initiate_sso("_flow-request-0002", None).await.unwrap();
    let params = RedirectParams::from_url(&redirect_url).unwrap();
    let decoded = HttpRedirectBinding::decode_unverified(&params, SamlMessageType::Request)
        .require("redirect binding")
        .unwrap();

    let response_url = idp.answer(&decoded.xml, "https://sp.example.com/acs");
    let tampered = response_url.replacen("SAMLResponse=", "SAMLResponse=AAAA", 1);

    let err = sp.receive_redirect_response(&tampered).await.unwrap_err();
    assert!(matches!(err, SpError::SignatureInvalid(_) | SpError::Format(_)));

    // A later, untampered response still validates.
    let assertion = sp.receive_redirect_response(&response_url).await.unwrap();
    assert_eq!(assertion.name_id.value, "alice@example.com");
}
