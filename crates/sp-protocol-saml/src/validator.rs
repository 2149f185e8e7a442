//! Response validation pipeline.
//!
//! Checks run strictly in order: status, replay correlation, assertion
//! signature, time window, issuer and audience. The first failure aborts
//! the pipeline; only a response that passes everything produces a
//! [`ValidatedAssertion`]. The validator itself never touches session or
//! correlation state.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::SpConfiguration;
use crate::decrypt::AssertionDecryptor;
use crate::error::{SpError, SpResult};
use crate::signature::XmlSignatureVerifier;
use crate::state::CertificatePair;
use crate::types::{AssertionAttribute, NameId, Status, StatusCode, ValidatedAssertion};
use crate::xml::{self, SamlDocument};

/// Validates inbound SAML responses for one deployment.
pub struct ResponseValidator<'a> {
    config: &'a SpConfiguration,
    certificates: &'a CertificatePair,
}

impl<'a> ResponseValidator<'a> {
    /// Creates a validator over the resolved configuration and certificate
    /// material.
    #[must_use]
    pub const fn new(config: &'a SpConfiguration, certificates: &'a CertificatePair) -> Self {
        Self { config, certificates }
    }

    /// Runs the full validation pipeline against a response document.
    ///
    /// `outstanding_request_id` is the identifier of the round trip this
    /// process initiated, as recorded in the correlation store.
    pub fn validate(
        &self,
        document: &SamlDocument,
        outstanding_request_id: &str,
    ) -> SpResult<ValidatedAssertion> {
        let doc = document.as_str();

        self.check_status(doc)?;
        self.check_correlation(doc, outstanding_request_id)?;

        let decryptor = AssertionDecryptor::new(&self.certificates.sp_private_key_der);
        let assertion = decryptor.extract_assertion(doc)?;

        let signed = self.check_signature(document, &assertion)?;
        let (not_before, not_on_or_after) = self.check_time_window(&assertion)?;
        let audiences = self.check_issuer_and_audience(&assertion)?;

        let name_id_value = xml::element_text(&assertion, "NameID")
            .ok_or_else(|| SpError::MissingElement("NameID".to_string()))?;
        let mut name_id = NameId::new(name_id_value);
        name_id.format = xml::element_attribute(&assertion, "NameID", "Format");

        let assertion_value = ValidatedAssertion {
            issuer: self.config.idp_entity_id.clone(),
            name_id,
            session_index: xml::element_attribute(&assertion, "AuthnStatement", "SessionIndex"),
            not_before,
            not_on_or_after,
            audiences,
            attributes: parse_attributes(&assertion),
            signed,
        };

        tracing::info!(
            subject = %assertion_value.name_id.value,
            signed = assertion_value.signed,
            "SAML response validated"
        );
        Ok(assertion_value)
    }

    /// Step 1: the response status must be Success. `NoPassive` is
    /// reported as its own condition; any other non-success status is a
    /// protocol failure carrying the code.
    fn check_status(&self, doc: &str) -> SpResult<()> {
        let codes = xml::all_element_attributes(doc, "StatusCode", "Value");
        let Some(top) = codes.first() else {
            return Err(SpError::MissingElement("StatusCode".to_string()));
        };

        let mut status = Status::from_code(top.clone());
        if let Some(sub) = codes.get(1) {
            status.status_code = StatusCode::new(top.clone())
                .with_sub_status(StatusCode::new(sub.clone()));
        }

        if status.is_no_passive() {
            return Err(SpError::NoPassive);
        }
        if !status.is_success() {
            return Err(SpError::Status { code: status.effective_code().to_string() });
        }
        Ok(())
    }

    /// Step 2: correlate `InResponseTo` with the outstanding request.
    /// Either identifier missing or empty fails, as does a mismatch;
    /// exact equality is the valid case.
    fn check_correlation(&self, doc: &str, outstanding_request_id: &str) -> SpResult<()> {
        let in_response_to = xml::root_attribute(doc, "InResponseTo")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| SpError::Replay("response carries no InResponseTo".to_string()))?;

        if outstanding_request_id.is_empty() {
            return Err(SpError::Replay("no outstanding request for this session".to_string()));
        }
        if in_response_to != outstanding_request_id {
            return Err(SpError::Replay(format!(
                "response correlates to '{in_response_to}', expected '{outstanding_request_id}'"
            )));
        }
        Ok(())
    }

    /// Step 3: verify the assertion signature against the IdP key, unless
    /// the deployment omits the check.
    fn check_signature(&self, document: &SamlDocument, assertion: &str) -> SpResult<bool> {
        if self.config.omit_assertion_signature_check {
            tracing::debug!("assertion signature check omitted by configuration");
            return Ok(false);
        }
        if !document.preserves_whitespace() {
            return Err(SpError::SignatureInvalid(
                "document was parsed without whitespace preservation".to_string(),
            ));
        }

        let assertion_id = element_id(assertion).ok_or_else(|| {
            SpError::SignatureInvalid("assertion carries no ID attribute".to_string())
        })?;
        let assertion_doc = SamlDocument::parse(assertion.to_string())?;
        let verifier = XmlSignatureVerifier::new(vec![self.certificates.idp_certificate_der.clone()]);
        verifier.verify(&assertion_doc, &assertion_id)?;
        Ok(true)
    }

    /// Step 4: the validity window, with the configured clock skew.
    /// The upper bound is non-strict: `now == NotOnOrAfter` is accepted.
    fn check_time_window(
        &self,
        assertion: &str,
    ) -> SpResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let now = Utc::now();
        let skew = self.config.clock_skew;

        let not_before = parse_instant(xml::element_attribute(assertion, "Conditions", "NotBefore"))?;
        let not_on_or_after =
            parse_instant(xml::element_attribute(assertion, "Conditions", "NotOnOrAfter"))?;

        if let Some(not_before) = not_before {
            if not_before > now + skew {
                return Err(SpError::TimeWindow(format!(
                    "assertion not valid before {not_before}"
                )));
            }
        }
        if let Some(not_on_or_after) = not_on_or_after {
            if not_on_or_after <= now - skew {
                return Err(SpError::TimeWindow(format!(
                    "assertion expired at {not_on_or_after}"
                )));
            }
        }
        Ok((not_before, not_on_or_after))
    }

    /// Step 5: issuer equality and audience containment.
    fn check_issuer_and_audience(&self, assertion: &str) -> SpResult<Vec<String>> {
        let issuer = xml::element_text(assertion, "Issuer")
            .ok_or_else(|| SpError::MissingElement("assertion Issuer".to_string()))?;
        if issuer != self.config.idp_entity_id {
            return Err(SpError::IssuerMismatch {
                expected: self.config.idp_entity_id.clone(),
                actual: issuer,
            });
        }

        let audiences = xml::all_element_texts(assertion, "Audience");
        if !audiences.is_empty() && !audiences.iter().any(|a| a == &self.config.sp_entity_id) {
            return Err(SpError::AudienceMismatch {
                expected: self.config.sp_entity_id.clone(),
            });
        }
        Ok(audiences)
    }
}

fn parse_instant(value: Option<String>) -> SpResult<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|instant| Some(instant.with_timezone(&Utc)))
            .map_err(|e| SpError::Format(format!("invalid timestamp '{raw}': {e}"))),
    }
}

/// Reads the ID attribute of an element, accepting the non-standard
/// capitalizations SAML uses.
fn element_id(element: &str) -> Option<String> {
    ["ID", "Id", "id"]
        .iter()
        .find_map(|attr| xml::attribute_at(element, 0, attr))
}

/// Parses the assertion's attribute statement into (name, values) pairs,
/// preserving document order.
fn parse_attributes(assertion: &str) -> Vec<AssertionAttribute> {
    let mut reader = Reader::from_str(assertion);
    let mut attributes = Vec::new();
    let mut current: Option<AssertionAttribute> = None;
    let mut value: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Attribute" => {
                let name = e
                    .try_get_attribute("Name")
                    .ok()
                    .flatten()
                    .and_then(|attr| attr.unescape_value().ok())
                    .map(|v| v.into_owned())
                    .unwrap_or_default();
                current = Some(AssertionAttribute { name, values: Vec::new() });
            }
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"AttributeValue" => {
                value = Some(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if let Some(ref mut text) = value {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"AttributeValue" => {
                if let (Some(attr), Some(text)) = (current.as_mut(), value.take()) {
                    attr.values.push(text);
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"Attribute" => {
                if let Some(attr) = current.take() {
                    attributes.push(attr);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SecondsFormat};

    use crate::config::test_configuration;
    use crate::signature::XmlSigner;
    use crate::types::{status_codes, sub_status_codes};

    struct TestIdp {
        private_key_der: Vec<u8>,
        public_key_der: Vec<u8>,
    }

    fn test_idp() -> TestIdp {
        use aws_lc_rs::encoding::AsDer;
        use aws_lc_rs::rsa::KeySize;
        use aws_lc_rs::signature::{KeyPair, RsaKeyPair};

        let key = RsaKeyPair::generate(KeySize::Rsa2048).unwrap();
        TestIdp {
            private_key_der: key.as_der().unwrap().as_ref().to_vec(),
            public_key_der: key.public_key().as_ref().to_vec(),
        }
    }

    fn certificates(idp: &TestIdp) -> CertificatePair {
        CertificatePair {
            idp_certificate_der: idp.public_key_der.clone(),
            sp_certificate_der: Vec::new(),
            sp_private_key_der: idp.private_key_der.clone(),
        }
    }

    fn instant(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn response_xml(
        status: &str,
        sub_status: Option<&str>,
        in_response_to: &str,
        not_on_or_after: DateTime<Utc>,
        audience: &str,
    ) -> String {
        let sub = sub_status
            .map(|code| format!(r#"<samlp:StatusCode Value="{code}"/>"#))
            .unwrap_or_default();
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp123456789abc" Version="2.0" InResponseTo="{in_response_to}"><saml:Issuer>https://idp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="{status}">{sub}</samlp:StatusCode></samlp:Status><saml:Assertion ID="_assertion1234567" Version="2.0" IssueInstant="{issued}"><saml:Issuer>https://idp.example.com</saml:Issuer><saml:Subject><saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">user@example.com</saml:NameID></saml:Subject><saml:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_after}"><saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction></saml:Conditions><saml:AuthnStatement AuthnInstant="{issued}" SessionIndex="_session42"/><saml:AttributeStatement><saml:Attribute Name="role"><saml:AttributeValue>admin</saml:AttributeValue><saml:AttributeValue>user</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion></samlp:Response>"#,
            issued = instant(Utc::now()),
            not_before = instant(Utc::now() - Duration::minutes(5)),
            not_after = instant(not_on_or_after),
        )
    }

    fn valid_response(in_response_to: &str) -> String {
        response_xml(
            status_codes::SUCCESS,
            None,
            in_response_to,
            Utc::now() + Duration::minutes(5),
            "https://sp.example.com",
        )
    }

    #[test]
    fn happy_path_produces_assertion() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let document = SamlDocument::parse(valid_response("_req1234567890ab")).unwrap();
        let assertion = validator.validate(&document, "_req1234567890ab").unwrap();

        assert_eq!(assertion.name_id.value, "user@example.com");
        assert_eq!(assertion.session_index.as_deref(), Some("_session42"));
        assert_eq!(assertion.attribute("role").unwrap(), ["admin", "user"]);
        assert_eq!(assertion.audiences, ["https://sp.example.com"]);
        assert!(!assertion.signed);
    }

    #[test]
    fn signed_assertion_verifies_against_idp_key() {
        let idp = test_idp();
        let config = test_configuration();
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let signer = XmlSigner::new(idp.private_key_der.clone(), None);
        let signed = signer.sign(&valid_response("_req1234567890ab"), "_assertion1234567").unwrap();

        let document = SamlDocument::parse(signed).unwrap();
        let assertion = validator.validate(&document, "_req1234567890ab").unwrap();
        assert!(assertion.signed);
    }

    #[test]
    fn unsigned_assertion_is_rejected_when_check_required() {
        let idp = test_idp();
        let config = test_configuration();
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let document = SamlDocument::parse(valid_response("_req1234567890ab")).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::SignatureInvalid(_)));
    }

    #[test]
    fn no_passive_is_a_distinct_condition() {
        let idp = test_idp();
        let config = test_configuration();
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let xml = response_xml(
            status_codes::RESPONDER,
            Some(sub_status_codes::NO_PASSIVE),
            "_req1234567890ab",
            Utc::now() + Duration::minutes(5),
            "https://sp.example.com",
        );
        let document = SamlDocument::parse(xml).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::NoPassive));
    }

    #[test]
    fn generic_failure_status_carries_the_code() {
        let idp = test_idp();
        let config = test_configuration();
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let xml = response_xml(
            status_codes::REQUESTER,
            None,
            "_req1234567890ab",
            Utc::now() + Duration::minutes(5),
            "https://sp.example.com",
        );
        let document = SamlDocument::parse(xml).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::Status { ref code } if code == status_codes::REQUESTER));
    }

    #[test]
    fn mismatched_correlation_is_a_replay_error() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let document = SamlDocument::parse(valid_response("_req1234567890ab")).unwrap();
        let err = validator.validate(&document, "_other123456789a").unwrap_err();
        assert!(matches!(err, SpError::Replay(_)));
    }

    #[test]
    fn missing_in_response_to_is_a_replay_error() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let xml = valid_response("_req1234567890ab")
            .replace(r#" InResponseTo="_req1234567890ab""#, "");
        let document = SamlDocument::parse(xml).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::Replay(_)));
    }

    #[test]
    fn expired_assertion_is_rejected() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        // Earlier than now minus the allowed skew.
        let xml = response_xml(
            status_codes::SUCCESS,
            None,
            "_req1234567890ab",
            Utc::now() - Duration::minutes(30),
            "https://sp.example.com",
        );
        let document = SamlDocument::parse(xml).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::TimeWindow(_)));
    }

    #[test]
    fn expiry_exactly_now_is_accepted() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let xml = response_xml(
            status_codes::SUCCESS,
            None,
            "_req1234567890ab",
            Utc::now(),
            "https://sp.example.com",
        );
        let document = SamlDocument::parse(xml).unwrap();
        assert!(validator.validate(&document, "_req1234567890ab").is_ok());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let xml = valid_response("_req1234567890ab").replace(
            "<saml:Issuer>https://idp.example.com</saml:Issuer><saml:Subject>",
            "<saml:Issuer>https://rogue.example.com</saml:Issuer><saml:Subject>",
        );
        let document = SamlDocument::parse(xml).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::IssuerMismatch { .. }));
    }

    #[test]
    fn foreign_audience_is_rejected() {
        let idp = test_idp();
        let mut config = test_configuration();
        config.omit_assertion_signature_check = true;
        let certs = certificates(&idp);
        let validator = ResponseValidator::new(&config, &certs);

        let xml = response_xml(
            status_codes::SUCCESS,
            None,
            "_req1234567890ab",
            Utc::now() + Duration::minutes(5),
            "https://someone-else.example.com",
        );
        let document = SamlDocument::parse(xml).unwrap();
        let err = validator.validate(&document, "_req1234567890ab").unwrap_err();
        assert!(matches!(err, SpError::AudienceMismatch { .. }));
    }
}
