//! # sp-protocol-saml
//!
//! The service-provider side of the SAML 2.0 Web Browser SSO and Single
//! Logout profiles:
//!
//! - **Message construction** - AuthnRequest, LogoutRequest and
//!   LogoutResponse with fresh, entropy-checked identifiers
//! - **XML signature** - enveloped XML-DSig signing and verification with
//!   wrapping-attack rejection
//! - **Bindings** - HTTP-Redirect (DEFLATE + detached query signature),
//!   HTTP-Artifact (44-byte artifact + SOAP ArtifactResolve), and
//!   HTTP-POST decode
//! - **Assertion decryption** - XML-Enc `EncryptedAssertion` handling with
//!   the SP private key
//! - **Validation** - the status / replay / signature / time-window /
//!   issuer pipeline producing a [`types::ValidatedAssertion`]
//! - **Orchestration** - [`orchestrator::ServiceProvider`], the façade the
//!   hosting application drives
//!
//! The hosting web framework, session persistence, and certificate
//! storage stay outside: they are consumed through the
//! [`state::CertificateProvider`] and [`state::CorrelationStore`]
//! capability traits.
//!
//! # SAML specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod bindings;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod orchestrator;
pub mod signature;
pub mod state;
pub mod types;
pub mod validator;
pub mod xml;

pub use artifact::Artifact;
pub use config::{IdentityProviderConfig, ServiceProviderConfig, SpConfiguration};
pub use error::{SpError, SpResult};
pub use orchestrator::ServiceProvider;
pub use state::{CertificatePair, CertificateProvider, CorrelationStore, PendingCorrelation};
pub use types::ValidatedAssertion;
