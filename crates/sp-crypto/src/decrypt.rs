//! XML-Enc cryptographic primitives.
//!
//! The protocol layer parses the `<EncryptedAssertion>` structure; the two
//! operations here do the actual work: unwrapping the content-encryption
//! key with the SP private RSA key, and decrypting the payload with the
//! unwrapped AES key.

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM};
use aws_lc_rs::cipher::{
    DecryptionContext, PaddedBlockDecryptingKey, UnboundCipherKey, AES_128, AES_256,
};
use aws_lc_rs::iv::FixedLength;
use aws_lc_rs::rsa::{
    OaepPrivateDecryptingKey, Pkcs1PrivateDecryptingKey, PrivateDecryptingKey,
    OAEP_SHA1_MGF1SHA1, OAEP_SHA256_MGF1SHA256,
};

use crate::error::CryptoError;

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;
const CBC_IV_LEN: usize = 16;

/// Key-transport algorithms for unwrapping the content-encryption key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransportAlgorithm {
    /// RSA-OAEP with SHA-1 and MGF1(SHA-1).
    RsaOaepSha1,
    /// RSA-OAEP with SHA-256 and MGF1(SHA-256).
    RsaOaepSha256,
    /// RSA PKCS#1 v1.5.
    RsaPkcs1,
}

impl KeyTransportAlgorithm {
    /// Returns the XML-Enc algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaOaepSha1 => "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p",
            Self::RsaOaepSha256 => "http://www.w3.org/2009/xmlenc11#rsa-oaep",
            Self::RsaPkcs1 => "http://www.w3.org/2001/04/xmlenc#rsa-1_5",
        }
    }

    /// Parses a key-transport algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p" => Some(Self::RsaOaepSha1),
            "http://www.w3.org/2009/xmlenc11#rsa-oaep" => Some(Self::RsaOaepSha256),
            "http://www.w3.org/2001/04/xmlenc#rsa-1_5" => Some(Self::RsaPkcs1),
            _ => None,
        }
    }
}

/// Block ciphers for the encrypted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCipher {
    /// AES-128 in GCM mode.
    Aes128Gcm,
    /// AES-256 in GCM mode.
    Aes256Gcm,
    /// AES-128 in CBC mode.
    Aes128Cbc,
    /// AES-256 in CBC mode.
    Aes256Cbc,
}

impl DataCipher {
    /// Returns the XML-Enc algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "http://www.w3.org/2009/xmlenc11#aes128-gcm",
            Self::Aes256Gcm => "http://www.w3.org/2009/xmlenc11#aes256-gcm",
            Self::Aes128Cbc => "http://www.w3.org/2001/04/xmlenc#aes128-cbc",
            Self::Aes256Cbc => "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
        }
    }

    /// Parses a data cipher from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2009/xmlenc11#aes128-gcm" => Some(Self::Aes128Gcm),
            "http://www.w3.org/2009/xmlenc11#aes256-gcm" => Some(Self::Aes256Gcm),
            "http://www.w3.org/2001/04/xmlenc#aes128-cbc" => Some(Self::Aes128Cbc),
            "http://www.w3.org/2001/04/xmlenc#aes256-cbc" => Some(Self::Aes256Cbc),
            _ => None,
        }
    }

    /// Returns the AES key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes128Cbc => 16,
            Self::Aes256Gcm | Self::Aes256Cbc => 32,
        }
    }
}

/// Unwraps a content-encryption key with the SP private RSA key.
///
/// `private_key_der` is the PKCS#8 private key; `ciphertext` is the raw
/// `<CipherValue>` of the `<EncryptedKey>`.
pub fn rsa_unwrap(
    private_key_der: &[u8],
    algorithm: KeyTransportAlgorithm,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let private_key = PrivateDecryptingKey::from_pkcs8(private_key_der)
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA decryption key: {e}")))?;

    match algorithm {
        KeyTransportAlgorithm::RsaPkcs1 => {
            let key = Pkcs1PrivateDecryptingKey::new(private_key)
                .map_err(|e| CryptoError::InvalidKey(format!("PKCS#1 key setup failed: {e}")))?;
            let mut output = vec![0u8; key.key_size_bytes()];
            let plaintext = key
                .decrypt(ciphertext, &mut output)
                .map_err(|e| CryptoError::Decryption(format!("RSA key unwrap failed: {e}")))?;
            Ok(plaintext.to_vec())
        }
        KeyTransportAlgorithm::RsaOaepSha1 | KeyTransportAlgorithm::RsaOaepSha256 => {
            let oaep_alg = match algorithm {
                KeyTransportAlgorithm::RsaOaepSha1 => &OAEP_SHA1_MGF1SHA1,
                _ => &OAEP_SHA256_MGF1SHA256,
            };
            let key = OaepPrivateDecryptingKey::new(private_key)
                .map_err(|e| CryptoError::InvalidKey(format!("OAEP key setup failed: {e}")))?;
            let mut output = vec![0u8; key.key_size_bytes()];
            let plaintext = key
                .decrypt(oaep_alg, ciphertext, &mut output, None)
                .map_err(|e| CryptoError::Decryption(format!("RSA key unwrap failed: {e}")))?;
            Ok(plaintext.to_vec())
        }
    }
}

/// Decrypts an XML-Enc payload.
///
/// `data` is the raw `<CipherValue>` of the `<EncryptedData>`: IV followed
/// by ciphertext (and, for GCM, the trailing authentication tag).
pub fn decrypt_payload(
    cipher: DataCipher,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if key.len() != cipher.key_len() {
        return Err(CryptoError::Decryption(format!(
            "content key length {} does not match cipher {}",
            key.len(),
            cipher.uri()
        )));
    }

    match cipher {
        DataCipher::Aes128Gcm | DataCipher::Aes256Gcm => {
            if data.len() < GCM_NONCE_LEN + GCM_TAG_LEN {
                return Err(CryptoError::Decryption("GCM payload too short".to_string()));
            }
            let aead_alg = if cipher == DataCipher::Aes128Gcm { &AES_128_GCM } else { &AES_256_GCM };
            let unbound = UnboundKey::new(aead_alg, key)
                .map_err(|e| CryptoError::InvalidKey(format!("AES key setup failed: {e}")))?;
            let aead_key = LessSafeKey::new(unbound);
            let nonce = Nonce::try_assume_unique_for_key(&data[..GCM_NONCE_LEN])
                .map_err(|e| CryptoError::Decryption(format!("bad GCM nonce: {e}")))?;
            let mut in_out = data[GCM_NONCE_LEN..].to_vec();
            let plaintext = aead_key
                .open_in_place(nonce, Aad::empty(), &mut in_out)
                .map_err(|_| CryptoError::Decryption("GCM authentication failed".to_string()))?;
            Ok(plaintext.to_vec())
        }
        DataCipher::Aes128Cbc | DataCipher::Aes256Cbc => {
            if data.len() < CBC_IV_LEN * 2 || (data.len() - CBC_IV_LEN) % CBC_IV_LEN != 0 {
                return Err(CryptoError::Decryption("CBC payload length invalid".to_string()));
            }
            let block_alg = if cipher == DataCipher::Aes128Cbc { &AES_128 } else { &AES_256 };
            let unbound = UnboundCipherKey::new(block_alg, key)
                .map_err(|e| CryptoError::InvalidKey(format!("AES key setup failed: {e}")))?;
            let cbc_key = PaddedBlockDecryptingKey::cbc_pkcs7(unbound)
                .map_err(|e| CryptoError::InvalidKey(format!("CBC key setup failed: {e}")))?;
            let iv = FixedLength::<CBC_IV_LEN>::try_from(&data[..CBC_IV_LEN])
                .map_err(|_| CryptoError::Decryption("bad CBC IV".to_string()))?;
            let mut in_out = data[CBC_IV_LEN..].to_vec();
            let plaintext = cbc_key
                .decrypt(&mut in_out, DecryptionContext::Iv128(iv))
                .map_err(|_| CryptoError::Decryption("CBC decryption failed".to_string()))?;
            Ok(plaintext.to_vec())
        }
    }
}
