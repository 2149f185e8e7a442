//! HTTP-POST binding.
//!
//! Responses delivered by form POST are Base64-encoded without
//! compression; authenticity comes from the enveloped XML signature, not
//! a transport signature.

use base64::Engine;

use crate::error::SpError;
use crate::types::SamlMessageType;
use crate::xml::xml_escape;

use super::{BindingOutcome, DecodedMessage};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a SAML message into an auto-submitting HTML form.
    #[must_use]
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(xml);
        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    xml_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>SAML POST Binding</title></head>
<body onload="document.forms[0].submit()">
    <noscript><p>JavaScript is disabled. Click the button below to continue.</p></noscript>
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript><input type="submit" value="Continue"/></noscript>
    </form>
</body>
</html>"#,
            xml_escape(destination),
            message_type.query_param(),
            encoded,
            relay_state_input
        )
    }

    /// Decodes an inbound POST envelope from its form fields.
    ///
    /// Returns [`BindingOutcome::NotApplicable`] when the expected message
    /// field is absent.
    #[must_use]
    pub fn decode(
        message_field: Option<&str>,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> BindingOutcome<DecodedMessage> {
        let Some(encoded) = message_field else {
            return BindingOutcome::NotApplicable;
        };

        let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => bytes,
            Err(e) => return BindingOutcome::Rejected(e.into()),
        };
        let xml = match String::from_utf8(decoded) {
            Ok(xml) => xml,
            Err(e) => {
                return BindingOutcome::Rejected(SpError::Format(format!(
                    "message is not valid UTF-8: {e}"
                )));
            }
        };

        BindingOutcome::Accepted(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
        })
    }
}
