//! Core SAML types for the service-provider side.

mod assertion;
mod constants;
mod messages;
mod name_id;
mod status;

pub use assertion::*;
pub use constants::*;
pub use messages::*;
pub use name_id::*;
pub use status::*;
