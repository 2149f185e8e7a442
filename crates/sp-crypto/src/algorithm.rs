//! Signature algorithm selection and dispatch.
//!
//! SAML deployments name their query-string and XML-DSig algorithms by URI;
//! configuration files name them by short digest name. Both resolve here to
//! a [`SigningAlgorithm`], a stateless value that dispatches to the concrete
//! aws-lc-rs sign/verify operation.

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{self, RsaKeyPair, UnparsedPublicKey};

use crate::error::CryptoError;

/// Key types a deployment's certificate pair can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// RSA key (PKCS#1 v1.5 signatures).
    Rsa,
    /// DSA key (raw DSA signatures).
    Dsa,
}

impl KeyType {
    /// Returns the lowercase name used in algorithm URIs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Dsa => "dsa",
        }
    }
}

/// Digest algorithms used for signing and digesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-1 (verification and artifact source-id only).
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the short name used in configuration ("SHA256" etc).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }

    /// Returns the XML-Enc/XML-DSig digest algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            Self::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// Parses a short configuration name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" => Some(Self::Sha256),
            "SHA384" | "SHA-384" => Some(Self::Sha384),
            "SHA512" | "SHA-512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Returns the digest output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// A resolved (key type, digest) signing algorithm.
///
/// Values are cheap to copy and safe for concurrent use; the concrete
/// operation is selected per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningAlgorithm {
    /// The key type.
    pub key_type: KeyType,
    /// The digest the signature is computed over.
    pub digest: DigestAlgorithm,
}

impl SigningAlgorithm {
    /// Resolves an algorithm from a key type and an identifier.
    ///
    /// The identifier may be a short digest name ("SHA256") or a full
    /// XML-DSig algorithm URI. An unrecognized identifier is a
    /// configuration error naming the string.
    pub fn resolve(key_type: KeyType, identifier: &str) -> Result<Self, CryptoError> {
        if let Some(alg) = Self::from_uri(identifier) {
            if alg.key_type != key_type {
                return Err(CryptoError::UnsupportedAlgorithm {
                    key_type: key_type.name(),
                    digest: alg.digest.name(),
                });
            }
            return Ok(alg);
        }
        let digest = DigestAlgorithm::from_name(identifier)
            .ok_or_else(|| CryptoError::UnknownAlgorithm(identifier.to_string()))?;
        Ok(Self { key_type, digest })
    }

    /// Returns the XML-DSig signature algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match (self.key_type, self.digest) {
            (KeyType::Rsa, DigestAlgorithm::Sha1) => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            (KeyType::Rsa, DigestAlgorithm::Sha256) => {
                "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
            }
            (KeyType::Rsa, DigestAlgorithm::Sha384) => {
                "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384"
            }
            (KeyType::Rsa, DigestAlgorithm::Sha512) => {
                "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512"
            }
            (KeyType::Dsa, DigestAlgorithm::Sha1) => "http://www.w3.org/2000/09/xmldsig#dsa-sha1",
            (KeyType::Dsa, DigestAlgorithm::Sha256) => {
                "http://www.w3.org/2009/xmldsig11#dsa-sha256"
            }
            // No registered URI; never emitted since signing rejects the pair.
            (KeyType::Dsa, _) => "http://www.w3.org/2000/09/xmldsig#dsa-sha1",
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (key_type, digest) = match uri {
            "http://www.w3.org/2000/09/xmldsig#rsa-sha1" => (KeyType::Rsa, DigestAlgorithm::Sha1),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => {
                (KeyType::Rsa, DigestAlgorithm::Sha256)
            }
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => {
                (KeyType::Rsa, DigestAlgorithm::Sha384)
            }
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => {
                (KeyType::Rsa, DigestAlgorithm::Sha512)
            }
            "http://www.w3.org/2000/09/xmldsig#dsa-sha1" => (KeyType::Dsa, DigestAlgorithm::Sha1),
            "http://www.w3.org/2009/xmldsig11#dsa-sha256" => {
                (KeyType::Dsa, DigestAlgorithm::Sha256)
            }
            _ => return None,
        };
        Some(Self { key_type, digest })
    }

    /// Signs `data` with a private key in DER format (PKCS#1 or PKCS#8).
    ///
    /// DSA pairings and RSA/SHA-1 have no backing signer and fail with a
    /// configuration error naming the pair.
    pub fn sign(self, private_key_der: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let padding = match (self.key_type, self.digest) {
            (KeyType::Rsa, DigestAlgorithm::Sha256) => &signature::RSA_PKCS1_SHA256,
            (KeyType::Rsa, DigestAlgorithm::Sha384) => &signature::RSA_PKCS1_SHA384,
            (KeyType::Rsa, DigestAlgorithm::Sha512) => &signature::RSA_PKCS1_SHA512,
            (key_type, digest) => {
                return Err(CryptoError::UnsupportedAlgorithm {
                    key_type: key_type.name(),
                    digest: digest.name(),
                });
            }
        };

        let key_pair = RsaKeyPair::from_der(private_key_der)
            .or_else(|_| RsaKeyPair::from_pkcs8(private_key_der))
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA key: {e}")))?;

        let rng = SystemRandom::new();
        let mut sig = vec![0u8; key_pair.public_modulus_len()];
        key_pair
            .sign(padding, &rng, data, &mut sig)
            .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
        Ok(sig)
    }

    /// Verifies `sig` over `data` against a public key in DER format.
    ///
    /// The key may be a `SubjectPublicKeyInfo` (as extracted from an X.509
    /// certificate) or a bare PKCS#1 `RSAPublicKey`. SHA-1 verification is
    /// supported for interoperability even though SHA-1 signing is not.
    pub fn verify(
        self,
        public_key_der: &[u8],
        data: &[u8],
        sig: &[u8],
    ) -> Result<bool, CryptoError> {
        let alg: &dyn signature::VerificationAlgorithm = match (self.key_type, self.digest) {
            (KeyType::Rsa, DigestAlgorithm::Sha1) => {
                &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY
            }
            (KeyType::Rsa, DigestAlgorithm::Sha256) => &signature::RSA_PKCS1_2048_8192_SHA256,
            (KeyType::Rsa, DigestAlgorithm::Sha384) => &signature::RSA_PKCS1_2048_8192_SHA384,
            (KeyType::Rsa, DigestAlgorithm::Sha512) => &signature::RSA_PKCS1_2048_8192_SHA512,
            (key_type, digest) => {
                return Err(CryptoError::UnsupportedAlgorithm {
                    key_type: key_type.name(),
                    digest: digest.name(),
                });
            }
        };

        let public_key = UnparsedPublicKey::new(alg, public_key_der);
        Ok(public_key.verify(data, sig).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_lc_rs::rsa::KeySize;
    use aws_lc_rs::signature::KeyPair;

    fn test_key() -> RsaKeyPair {
        RsaKeyPair::generate(KeySize::Rsa2048).expect("RSA key generation")
    }

    #[test]
    fn uri_roundtrip() {
        for alg in [
            SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha1 },
            SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha256 },
            SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha512 },
            SigningAlgorithm { key_type: KeyType::Dsa, digest: DigestAlgorithm::Sha1 },
        ] {
            assert_eq!(SigningAlgorithm::from_uri(alg.uri()), Some(alg));
        }
    }

    #[test]
    fn resolve_by_name_and_uri() {
        let by_name = SigningAlgorithm::resolve(KeyType::Rsa, "SHA256").unwrap();
        let by_uri = SigningAlgorithm::resolve(
            KeyType::Rsa,
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        )
        .unwrap();
        assert_eq!(by_name, by_uri);
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let err = SigningAlgorithm::resolve(KeyType::Rsa, "MD5").unwrap_err();
        assert!(matches!(err, CryptoError::UnknownAlgorithm(ref s) if s == "MD5"));
    }

    #[test]
    fn dsa_pairing_is_unsupported() {
        let alg = SigningAlgorithm { key_type: KeyType::Dsa, digest: DigestAlgorithm::Sha256 };
        let err = alg.sign(b"key", b"data").unwrap_err();
        match err {
            CryptoError::UnsupportedAlgorithm { key_type, digest } => {
                assert_eq!(key_type, "dsa");
                assert_eq!(digest, "SHA256");
            }
            other => panic!("expected UnsupportedAlgorithm, got {other:?}"),
        }
    }

    #[test]
    fn sha1_signing_is_unsupported_but_named() {
        let alg = SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha1 };
        assert!(alg.sign(b"key", b"data").is_err());
    }

    #[test]
    fn sign_verify_roundtrip() {
        let key = test_key();
        let key_der: Vec<u8> = {
            use aws_lc_rs::encoding::AsDer;
            key.as_der().unwrap().as_ref().to_vec()
        };
        let alg = SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha256 };

        let sig = alg.sign(&key_der, b"the message").unwrap();
        assert!(alg.verify(key.public_key().as_ref(), b"the message", &sig).unwrap());
        assert!(!alg.verify(key.public_key().as_ref(), b"another message", &sig).unwrap());
    }

    #[test]
    fn verify_with_wrong_digest_fails() {
        let key = test_key();
        let key_der: Vec<u8> = {
            use aws_lc_rs::encoding::AsDer;
            key.as_der().unwrap().as_ref().to_vec()
        };
        let sha256 = SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha256 };
        let sha512 = SigningAlgorithm { key_type: KeyType::Rsa, digest: DigestAlgorithm::Sha512 };

        let sig = sha256.sign(&key_der, b"payload").unwrap();
        assert!(!sha512.verify(key.public_key().as_ref(), b"payload", &sig).unwrap());
    }
}
