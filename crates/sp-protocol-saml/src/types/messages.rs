//! Protocol message construction.
//!
//! The message factory builds the three outbound message types with fresh
//! identifiers, UTC issue instants, and the configured issuer and
//! destinations. Construction is pure: no network or storage side effects.
//! Serialization happens exactly once, through `to_xml`.

use chrono::{DateTime, SecondsFormat, Utc};

use sp_crypto::random;

use crate::config::SpConfiguration;
use crate::error::{SpError, SpResult};
use crate::types::{status_codes, AuthnContextComparison, NameId};
use crate::xml::xml_escape;

/// Minimum accepted length of a protocol message identifier.
pub const MIN_REQUEST_ID_LEN: usize = random::MIN_REQUEST_ID_LEN;

/// Rejects caller-supplied identifiers that carry too little entropy.
fn validate_request_id(id: &str) -> SpResult<()> {
    if id.len() < MIN_REQUEST_ID_LEN {
        return Err(SpError::Format(format!(
            "request identifier '{id}' is shorter than {MIN_REQUEST_ID_LEN} characters"
        )));
    }
    Ok(())
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Name ID policy constraints requested in an AuthnRequest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIdPolicy {
    /// The requested name ID format URI.
    pub format: Option<String>,
    /// Whether the IdP may create a new identifier.
    pub allow_create: bool,
}

/// SAML authentication request, SP to IdP.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,
    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,
    /// The SP entity ID issuing the request.
    pub issuer: String,
    /// The IdP single sign-on URL.
    pub destination: String,
    /// The URL where the response should be delivered.
    pub assertion_consumer_service_url: String,
    /// Whether the IdP must re-authenticate the user.
    pub force_authn: bool,
    /// Whether the IdP must not interact with the user.
    pub is_passive: bool,
    /// Name ID policy constraints.
    pub name_id_policy: Option<NameIdPolicy>,
    /// Requested authentication context class references.
    pub authn_context_class_refs: Vec<String>,
    /// Comparison method for the authentication context.
    pub authn_context_comparison: AuthnContextComparison,
}

impl AuthnRequest {
    /// Serializes this request to its XML form.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{}" Version="2.0" IssueInstant="{}" Destination="{}" AssertionConsumerServiceURL="{}" ForceAuthn="{}" IsPassive="{}"><saml:Issuer>{}</saml:Issuer>"#,
            xml_escape(&self.id),
            format_instant(self.issue_instant),
            xml_escape(&self.destination),
            xml_escape(&self.assertion_consumer_service_url),
            self.force_authn,
            self.is_passive,
            xml_escape(&self.issuer),
        );

        if let Some(ref policy) = self.name_id_policy {
            xml.push_str("<samlp:NameIDPolicy");
            if let Some(ref format) = policy.format {
                xml.push_str(&format!(r#" Format="{}""#, xml_escape(format)));
            }
            xml.push_str(&format!(r#" AllowCreate="{}"/>"#, policy.allow_create));
        }

        if !self.authn_context_class_refs.is_empty() {
            xml.push_str(&format!(
                r#"<samlp:RequestedAuthnContext Comparison="{}">"#,
                self.authn_context_comparison.as_str()
            ));
            for class_ref in &self.authn_context_class_refs {
                xml.push_str(&format!(
                    "<saml:AuthnContextClassRef>{}</saml:AuthnContextClassRef>",
                    xml_escape(class_ref)
                ));
            }
            xml.push_str("</samlp:RequestedAuthnContext>");
        }

        xml.push_str("</samlp:AuthnRequest>");
        xml
    }
}

/// SAML logout request, SP to IdP.
#[derive(Debug, Clone)]
pub struct LogoutRequest {
    /// Unique identifier for this request.
    pub id: String,
    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,
    /// The SP entity ID issuing the request.
    pub issuer: String,
    /// The IdP single logout URL.
    pub destination: String,
    /// The name identifier of the principal to log out.
    pub name_id: NameId,
    /// The session index to terminate.
    pub session_index: Option<String>,
    /// Reason for the logout.
    pub reason: Option<String>,
    /// Time after which the request is no longer valid.
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl LogoutRequest {
    /// User logout reason URI.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Serializes this request to its XML form.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{}" Version="2.0" IssueInstant="{}" Destination="{}""#,
            xml_escape(&self.id),
            format_instant(self.issue_instant),
            xml_escape(&self.destination),
        );
        if let Some(reason) = &self.reason {
            xml.push_str(&format!(r#" Reason="{}""#, xml_escape(reason)));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            xml.push_str(&format!(r#" NotOnOrAfter="{}""#, format_instant(not_on_or_after)));
        }
        xml.push('>');

        xml.push_str(&format!("<saml:Issuer>{}</saml:Issuer>", xml_escape(&self.issuer)));

        xml.push_str("<saml:NameID");
        if let Some(format) = &self.name_id.format {
            xml.push_str(&format!(r#" Format="{}""#, xml_escape(format)));
        }
        if let Some(qualifier) = &self.name_id.name_qualifier {
            xml.push_str(&format!(r#" NameQualifier="{}""#, xml_escape(qualifier)));
        }
        xml.push_str(&format!(">{}</saml:NameID>", xml_escape(&self.name_id.value)));

        if let Some(index) = &self.session_index {
            xml.push_str(&format!(
                "<samlp:SessionIndex>{}</samlp:SessionIndex>",
                xml_escape(index)
            ));
        }

        xml.push_str("</samlp:LogoutRequest>");
        xml
    }
}

/// SAML logout response, SP to IdP (answering an IdP-initiated logout).
#[derive(Debug, Clone)]
pub struct LogoutResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,
    /// The SP entity ID issuing the response.
    pub issuer: String,
    /// The IdP single logout URL.
    pub destination: String,
    /// The ID of the logout request this response answers.
    pub in_response_to: String,
    /// The status code URI to report.
    pub status_code: String,
}

impl LogoutResponse {
    /// Serializes this response to its XML form.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{}" Version="2.0" IssueInstant="{}" Destination="{}" InResponseTo="{}"><saml:Issuer>{}</saml:Issuer><samlp:Status><samlp:StatusCode Value="{}"/></samlp:Status></samlp:LogoutResponse>"#,
            xml_escape(&self.id),
            format_instant(self.issue_instant),
            xml_escape(&self.destination),
            xml_escape(&self.in_response_to),
            xml_escape(&self.issuer),
            xml_escape(&self.status_code),
        )
    }
}

/// Builds outbound protocol messages from the resolved configuration.
#[derive(Debug, Clone, Copy)]
pub struct MessageFactory<'a> {
    config: &'a SpConfiguration,
}

impl<'a> MessageFactory<'a> {
    /// Creates a factory bound to a resolved configuration.
    #[must_use]
    pub const fn new(config: &'a SpConfiguration) -> Self {
        Self { config }
    }

    /// Builds an authentication request with the supplied identifier.
    ///
    /// Identifiers shorter than [`MIN_REQUEST_ID_LEN`] characters are
    /// rejected at construction.
    pub fn authn_request(&self, request_id: &str) -> SpResult<AuthnRequest> {
        validate_request_id(request_id)?;
        Ok(AuthnRequest {
            id: request_id.to_string(),
            issue_instant: Utc::now(),
            issuer: self.config.sp_entity_id.clone(),
            destination: self.config.idp_sso_url.clone(),
            assertion_consumer_service_url: self.config.acs_url.clone(),
            force_authn: self.config.force_authn,
            is_passive: self.config.is_passive,
            name_id_policy: self.config.name_id_format.clone().map(|format| NameIdPolicy {
                format: Some(format),
                allow_create: true,
            }),
            authn_context_class_refs: self.config.authn_context_class_refs.clone(),
            authn_context_comparison: self.config.authn_context_comparison,
        })
    }

    /// Builds a logout request for the given principal and session.
    pub fn logout_request(
        &self,
        request_id: &str,
        name_id: NameId,
        session_index: Option<&str>,
    ) -> SpResult<LogoutRequest> {
        validate_request_id(request_id)?;
        Ok(LogoutRequest {
            id: request_id.to_string(),
            issue_instant: Utc::now(),
            issuer: self.config.sp_entity_id.clone(),
            destination: self.config.idp_slo_url.clone(),
            name_id,
            session_index: session_index.map(String::from),
            reason: Some(LogoutRequest::REASON_USER.to_string()),
            not_on_or_after: Some(Utc::now() + chrono::Duration::minutes(5)),
        })
    }

    /// Builds a logout response answering an IdP-initiated logout request.
    #[must_use]
    pub fn logout_response(&self, in_response_to: &str) -> LogoutResponse {
        LogoutResponse {
            id: random::generate_request_id(),
            issue_instant: Utc::now(),
            issuer: self.config.sp_entity_id.clone(),
            destination: self.config.idp_slo_url.clone(),
            in_response_to: in_response_to.to_string(),
            status_code: status_codes::SUCCESS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_configuration;

    #[test]
    fn short_request_id_is_rejected() {
        let config = test_configuration();
        let factory = MessageFactory::new(&config);

        let err = factory.authn_request("abc").unwrap_err();
        assert!(matches!(err, SpError::Format(_)));

        let err = factory.logout_request("abc", NameId::email("u@example.com"), None).unwrap_err();
        assert!(matches!(err, SpError::Format(_)));
    }

    #[test]
    fn sixteen_character_id_is_accepted() {
        let config = test_configuration();
        let factory = MessageFactory::new(&config);
        assert!(factory.authn_request("abcdefgh12345678").is_ok());
    }

    #[test]
    fn authn_request_serializes_configured_fields() {
        let config = test_configuration();
        let factory = MessageFactory::new(&config);
        let request = factory.authn_request("_request1234567890").unwrap();
        let xml = request.to_xml();

        assert!(xml.contains(r#"ID="_request1234567890""#));
        assert!(xml.contains(&format!("<saml:Issuer>{}</saml:Issuer>", config.sp_entity_id)));
        assert!(xml.contains(&format!(r#"Destination="{}""#, config.idp_sso_url)));
        assert!(xml.contains(&format!(r#"AssertionConsumerServiceURL="{}""#, config.acs_url)));
        assert!(xml.contains(r#"Version="2.0""#));
    }

    #[test]
    fn logout_request_carries_session_index() {
        let config = test_configuration();
        let factory = MessageFactory::new(&config);
        let request = factory
            .logout_request("_logout1234567890", NameId::email("u@example.com"), Some("_s1"))
            .unwrap();
        let xml = request.to_xml();

        assert!(xml.contains("<samlp:SessionIndex>_s1</samlp:SessionIndex>"));
        assert!(xml.contains(">u@example.com</saml:NameID>"));
    }

    #[test]
    fn logout_response_correlates_and_reports_success() {
        let config = test_configuration();
        let factory = MessageFactory::new(&config);
        let response = factory.logout_response("_idp-request-1");
        let xml = response.to_xml();

        assert!(response.id.len() >= MIN_REQUEST_ID_LEN);
        assert!(xml.contains(r#"InResponseTo="_idp-request-1""#));
        assert!(xml.contains(status_codes::SUCCESS));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let mut config = test_configuration();
        config.sp_entity_id = "https://sp.example.com/?a=1&b=\"2\"".to_string();
        let factory = MessageFactory::new(&config);
        let xml = factory.authn_request("_request1234567890").unwrap().to_xml();

        assert!(xml.contains("&amp;b="));
        assert!(!xml.contains("b=\"2\"</saml:Issuer>"));
    }
}
