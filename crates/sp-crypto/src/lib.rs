//! # sp-crypto
//!
//! Cryptographic primitives for the SAML service-provider engine, built on
//! aws-lc-rs.
//!
//! This crate carries the low-level operations the protocol layer depends
//! on:
//!
//! - **Signature algorithms** - PKCS#1 v1.5 RSA sign/verify selected by
//!   (key type, digest) or by XML-DSig algorithm URI
//! - **Digests** - SHA-1 (artifact source-id only), SHA-256/384/512
//! - **Randomness** - request identifiers and artifact message handles
//! - **Key material** - PEM/DER handling and certificate public-key
//!   extraction
//! - **XML-Enc primitives** - RSA key unwrap and AES payload decryption

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod decrypt;
pub mod error;
pub mod hash;
pub mod pem;
pub mod random;

pub use algorithm::{DigestAlgorithm, KeyType, SigningAlgorithm};
pub use decrypt::{DataCipher, KeyTransportAlgorithm};
pub use error::CryptoError;
pub use hash::{sha1, sha256, sha384, sha512};
