//! # fib-crypto
//!
//! Cryptographic primitives for the identity bridge, backed by aws-lc-rs.
//!
//! SAML deployments in the wild still sign with RSA PKCS#1 v1.5 over
//! SHA-256, so that is the baseline here. SHA-1 is not offered for either
//! signing or verification.
//!
//! - [`hash`] - Message digests used by XML-DSig references
//! - [`rsa`] - RSA signing and verification, certificate key extraction
//! - [`pem`] - PEM armor decoding
//! - [`random`] - Session and message identifiers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod pem;
pub mod random;
pub mod rsa;

pub use algorithm::{DigestAlgorithm, RsaAlgorithm};
pub use error::CryptoError;
pub use hash::{digest, digests_equal, sha256, sha384, sha512};
pub use pem::{pem_body, pem_to_der, private_key_der};
pub use random::{generate_request_id, generate_session_id};
pub use rsa::{certificate_public_key, rsa_sign, rsa_verify, validate_rsa_private_key};
