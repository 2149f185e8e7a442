//! Validated assertion values.
//!
//! A [`ValidatedAssertion`] is only ever produced by the validator after
//! every pipeline check has passed; callers consume it to build claims.

use chrono::{DateTime, Utc};

use super::NameId;

/// An assertion attribute: a name and its ordered values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionAttribute {
    /// The attribute name.
    pub name: String,
    /// The attribute values, in document order.
    pub values: Vec<String>,
}

/// A fully validated SAML assertion.
///
/// Immutable once produced; the validator never hands one out for a
/// response that failed any check.
#[derive(Debug, Clone)]
pub struct ValidatedAssertion {
    /// The IdP entity ID that issued the assertion.
    pub issuer: String,

    /// The subject's name identifier.
    pub name_id: NameId,

    /// The session index, if the IdP established one.
    pub session_index: Option<String>,

    /// Start of the validity window.
    pub not_before: Option<DateTime<Utc>>,

    /// End of the validity window (exclusive).
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions carried by the assertion.
    pub audiences: Vec<String>,

    /// Attributes about the subject, in document order.
    pub attributes: Vec<AssertionAttribute>,

    /// Whether the assertion carried a verified XML signature.
    pub signed: bool,
}

impl ValidatedAssertion {
    /// Returns the values of the named attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.values.as_slice())
    }

    /// Returns the first value of the named attribute, if present.
    #[must_use]
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(|values| values.first()).map(String::as_str)
    }
}
