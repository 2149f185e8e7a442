//! SAML status types.
//!
//! Status information carried by protocol responses from the IdP.

use super::{status_codes, sub_status_codes};

/// SAML protocol status as reported by the IdP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// The status code, possibly nested.
    pub status_code: StatusCode,

    /// Optional status message.
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::success(),
            status_message: None,
        }
    }

    /// Creates a status from a top-level code value.
    #[must_use]
    pub fn from_code(value: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(value),
            status_message: None,
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// Returns true if this status carries `NoPassive` at any level.
    #[must_use]
    pub fn is_no_passive(&self) -> bool {
        self.status_code.value == sub_status_codes::NO_PASSIVE
            || self.status_code.sub_status_value() == Some(sub_status_codes::NO_PASSIVE)
    }

    /// Returns the most specific status code value.
    #[must_use]
    pub fn effective_code(&self) -> &str {
        self.status_code
            .sub_status_value()
            .unwrap_or(&self.status_code.value)
    }

    /// Sets the status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code, possibly carrying a nested sub-code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Optional nested status code providing more detail.
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a new status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    /// Creates a success status code.
    #[must_use]
    pub fn success() -> Self {
        Self::new(status_codes::SUCCESS)
    }

    /// Adds a sub-status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub: StatusCode) -> Self {
        self.status_code = Some(Box::new(sub));
        self
    }

    /// Returns true if this is a success status code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.value == status_codes::SUCCESS
    }

    /// Returns the sub-status code value if present.
    #[must_use]
    pub fn sub_status_value(&self) -> Option<&str> {
        self.status_code.as_ref().map(|s| s.value.as_str())
    }
}
