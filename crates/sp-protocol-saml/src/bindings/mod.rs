//! SAML binding implementations.
//!
//! Wire transports for SAML protocol messages:
//!
//! - **HTTP-Redirect** - DEFLATE + Base64 + URL query parameters, with
//!   detached query-string signatures
//! - **HTTP-Artifact** - a 44-byte artifact reference resolved out-of-band
//!   over a SOAP ArtifactResolve exchange
//! - **HTTP-POST** - Base64 form fields with enveloped XML signatures
//!
//! Inbound decoding is a tri-state: a binding whose expected parameters
//! are absent reports [`BindingOutcome::NotApplicable`] instead of an
//! error, so callers can try successive bindings without exception-driven
//! dispatch.

mod artifact;
mod post;
mod redirect;

pub use artifact::*;
pub use post::*;
pub use redirect::*;

use crate::error::{SpError, SpResult};
use crate::types::SamlMessageType;

/// Result of offering an inbound envelope to a binding.
#[derive(Debug)]
pub enum BindingOutcome<T> {
    /// The envelope does not carry this binding's parameters; the binding
    /// is inert for this request.
    NotApplicable,
    /// The envelope was decoded and verified.
    Accepted(T),
    /// The envelope belongs to this binding but failed decoding or
    /// verification.
    Rejected(SpError),
}

impl<T> BindingOutcome<T> {
    /// Returns true when the binding did not handle the envelope.
    #[must_use]
    pub const fn is_not_applicable(&self) -> bool {
        matches!(self, Self::NotApplicable)
    }

    /// Converts into a result, mapping non-applicability to `None`.
    pub fn into_result(self) -> SpResult<Option<T>> {
        match self {
            Self::NotApplicable => Ok(None),
            Self::Accepted(value) => Ok(Some(value)),
            Self::Rejected(err) => Err(err),
        }
    }

    /// Converts into a result, treating non-applicability as the given
    /// error.
    pub fn require(self, context: &str) -> SpResult<T> {
        match self {
            Self::NotApplicable => Err(SpError::Format(format!(
                "envelope not handled by {context}"
            ))),
            Self::Accepted(value) => Ok(value),
            Self::Rejected(err) => Err(err),
        }
    }
}

/// A decoded inbound SAML message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// Whether this is a request or a response.
    pub message_type: SamlMessageType,
    /// The RelayState parameter, if present.
    pub relay_state: Option<String>,
}
