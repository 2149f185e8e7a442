//! Assertion decryption.
//!
//! Detects whether a response carries a direct `<Assertion>` or an
//! `<EncryptedAssertion>`; in the encrypted case the content-encryption
//! key is unwrapped with the SP private RSA key and the payload decrypted
//! with it.

use base64::Engine;

use sp_crypto::decrypt::{decrypt_payload, rsa_unwrap, DataCipher, KeyTransportAlgorithm};

use crate::error::{SpError, SpResult};
use crate::xml;

/// Decrypts encrypted assertions with the SP private key.
pub struct AssertionDecryptor<'a> {
    sp_private_key_der: &'a [u8],
}

impl<'a> AssertionDecryptor<'a> {
    /// Creates a decryptor over the SP private key.
    #[must_use]
    pub const fn new(sp_private_key_der: &'a [u8]) -> Self {
        Self { sp_private_key_der }
    }

    /// Returns the assertion element contained in `element_xml`.
    ///
    /// A direct `<Assertion>` passes through unchanged; an
    /// `<EncryptedAssertion>` is decrypted first. Neither present fails
    /// with a missing-assertion error.
    pub fn extract_assertion(&self, element_xml: &str) -> SpResult<String> {
        if let Some(encrypted) = xml::extract_element(element_xml, "EncryptedAssertion") {
            return self.decrypt(&encrypted);
        }
        xml::extract_element(element_xml, "Assertion")
            .ok_or_else(|| SpError::MissingElement("Assertion".to_string()))
    }

    fn decrypt(&self, encrypted_assertion: &str) -> SpResult<String> {
        let encrypted_data = xml::extract_element(encrypted_assertion, "EncryptedData")
            .ok_or_else(|| SpError::MissingElement("EncryptedData".to_string()))?;

        let encrypted_key = xml::extract_element(&encrypted_data, "EncryptedKey")
            .ok_or_else(|| SpError::MissingElement("EncryptedKey".to_string()))?;

        let transport_uri = xml::element_attribute(&encrypted_key, "EncryptionMethod", "Algorithm")
            .ok_or_else(|| SpError::MissingElement("EncryptedKey EncryptionMethod".to_string()))?;
        let transport = KeyTransportAlgorithm::from_uri(&transport_uri).ok_or_else(|| {
            SpError::Configuration(format!("unsupported key transport algorithm: {transport_uri}"))
        })?;
        let wrapped_key = cipher_value(&encrypted_key)?;

        // The remaining cipher text belongs to the data envelope.
        let data_only = xml::remove_element(&encrypted_data, "EncryptedKey");
        let cipher_uri = xml::element_attribute(&data_only, "EncryptionMethod", "Algorithm")
            .ok_or_else(|| SpError::MissingElement("EncryptedData EncryptionMethod".to_string()))?;
        let cipher = DataCipher::from_uri(&cipher_uri).ok_or_else(|| {
            SpError::Configuration(format!("unsupported data encryption algorithm: {cipher_uri}"))
        })?;
        let ciphertext = cipher_value(&data_only)?;

        let content_key = rsa_unwrap(self.sp_private_key_der, transport, &wrapped_key)?;
        let plaintext = decrypt_payload(cipher, &content_key, &ciphertext)?;
        let plaintext = String::from_utf8(plaintext)
            .map_err(|e| SpError::Format(format!("decrypted assertion is not UTF-8: {e}")))?;

        xml::extract_element(&plaintext, "Assertion")
            .ok_or_else(|| SpError::MissingElement("decrypted Assertion".to_string()))
    }
}

/// Reads the first base64 `<CipherValue>` of an element.
fn cipher_value(element: &str) -> SpResult<Vec<u8>> {
    let value = xml::element_text(element, "CipherValue")
        .ok_or_else(|| SpError::MissingElement("CipherValue".to_string()))?;
    let stripped: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(stripped)?)
}
