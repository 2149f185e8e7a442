//! SAML 2.0 artifact format.
//!
//! The type-0x0004 artifact is a fixed 44-byte big-endian layout: a 2-byte
//! type code, a 2-byte endpoint index, the 20-byte SHA-1 of the issuing
//! entity ID, and a 20-byte random message handle. Any other decoded
//! length is a format error.

use base64::Engine;

use sp_crypto::{hash, random};

use crate::error::{SpError, SpResult};
use crate::types::ARTIFACT_TYPE_CODE;

const SOURCE_ID_LEN: usize = 20;
const MESSAGE_HANDLE_LEN: usize = 20;
const ARTIFACT_LEN: usize = 2 + 2 + SOURCE_ID_LEN + MESSAGE_HANDLE_LEN;

/// A decoded SAML artifact. Single use: one artifact per exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The artifact type code (0x0004 for the standard format).
    pub type_code: u16,
    /// The index of the issuer's artifact resolution endpoint.
    pub endpoint_index: u16,
    /// SHA-1 hash of the issuing entity ID.
    pub source_id: [u8; SOURCE_ID_LEN],
    /// Cryptographically random message handle.
    pub message_handle: [u8; MESSAGE_HANDLE_LEN],
}

impl Artifact {
    /// Builds a fresh artifact for the given entity ID.
    #[must_use]
    pub fn issue(entity_id: &str, endpoint_index: u16) -> Self {
        let digest = hash::sha1(entity_id.as_bytes());
        let mut source_id = [0u8; SOURCE_ID_LEN];
        source_id.copy_from_slice(&digest);
        Self {
            type_code: ARTIFACT_TYPE_CODE,
            endpoint_index,
            source_id,
            message_handle: random::generate_message_handle(),
        }
    }

    /// Builds an artifact from raw parts, validating buffer lengths.
    pub fn from_parts(
        type_code: u16,
        endpoint_index: u16,
        source_id: &[u8],
        message_handle: &[u8],
    ) -> SpResult<Self> {
        if source_id.len() != SOURCE_ID_LEN {
            return Err(SpError::Format(format!(
                "artifact source-id must be {SOURCE_ID_LEN} bytes, got {}",
                source_id.len()
            )));
        }
        if message_handle.len() != MESSAGE_HANDLE_LEN {
            return Err(SpError::Format(format!(
                "artifact message handle must be {MESSAGE_HANDLE_LEN} bytes, got {}",
                message_handle.len()
            )));
        }
        let mut artifact = Self {
            type_code,
            endpoint_index,
            source_id: [0u8; SOURCE_ID_LEN],
            message_handle: [0u8; MESSAGE_HANDLE_LEN],
        };
        artifact.source_id.copy_from_slice(source_id);
        artifact.message_handle.copy_from_slice(message_handle);
        Ok(artifact)
    }

    /// Encodes the artifact to its Base64 wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(ARTIFACT_LEN);
        bytes.extend_from_slice(&self.type_code.to_be_bytes());
        bytes.extend_from_slice(&self.endpoint_index.to_be_bytes());
        bytes.extend_from_slice(&self.source_id);
        bytes.extend_from_slice(&self.message_handle);
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    /// Decodes an artifact from its Base64 wire form.
    ///
    /// Fails with a format error when the decoded length is not exactly
    /// 44 bytes.
    pub fn decode(encoded: &str) -> SpResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SpError::Format(format!("artifact base64 decode failed: {e}")))?;
        if bytes.len() != ARTIFACT_LEN {
            return Err(SpError::Format(format!(
                "artifact must decode to {ARTIFACT_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let type_code = u16::from_be_bytes([bytes[0], bytes[1]]);
        let endpoint_index = u16::from_be_bytes([bytes[2], bytes[3]]);
        Self::from_parts(type_code, endpoint_index, &bytes[4..24], &bytes[24..44])
    }

    /// Returns true if the source-id matches the SHA-1 of the entity ID.
    #[must_use]
    pub fn issued_by(&self, entity_id: &str) -> bool {
        hash::sha1(entity_id.as_bytes()) == self.source_id
    }
}
