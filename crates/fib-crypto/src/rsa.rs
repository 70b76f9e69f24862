//! RSA PKCS#1 v1.5 signatures.
//!
//! SAML 2.0 identity providers overwhelmingly expect RSA with SHA-256, so
//! that is what outgoing messages are signed with unless configured
//! otherwise. Verification keys come from X.509 certificates published in
//! IdP metadata.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair, UnparsedPublicKey},
};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::algorithm::RsaAlgorithm;
use crate::error::CryptoError;

/// Signs data with an RSA private key.
///
/// `key_der` may be PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`).
///
/// # Errors
///
/// Returns an error if the key cannot be parsed or signing fails.
pub fn rsa_sign(key_der: &[u8], data: &[u8], algorithm: RsaAlgorithm) -> Result<Vec<u8>, CryptoError> {
    let key_pair = key_pair(key_der)?;

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public_modulus_len()];

    let padding = match algorithm {
        RsaAlgorithm::RsaSha256 => &signature::RSA_PKCS1_SHA256,
        RsaAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
        RsaAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
    };

    key_pair
        .sign(padding, &rng, data, &mut sig)
        .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(sig)
}

/// Checks that `key_der` parses as an RSA private key usable for signing.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] otherwise.
pub fn validate_rsa_private_key(key_der: &[u8]) -> Result<(), CryptoError> {
    key_pair(key_der).map(|_| ())
}

fn key_pair(key_der: &[u8]) -> Result<RsaKeyPair, CryptoError> {
    RsaKeyPair::from_der(key_der)
        .or_else(|_| RsaKeyPair::from_pkcs8(key_der))
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA key: {e}")))
}

/// Verifies an RSA signature.
///
/// `public_key_der` is a PKCS#1 `RSAPublicKey`, as returned by
/// [`certificate_public_key`]. Returns `false` for a signature that does not
/// verify; malformed keys also verify as `false`.
#[must_use]
pub fn rsa_verify(public_key_der: &[u8], data: &[u8], sig: &[u8], algorithm: RsaAlgorithm) -> bool {
    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        RsaAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
    };

    UnparsedPublicKey::new(verification_alg, public_key_der)
        .verify(data, sig)
        .is_ok()
}

/// Extracts the RSA public key from a DER-encoded X.509 certificate.
///
/// # Errors
///
/// Returns an error if the certificate cannot be parsed.
pub fn certificate_public_key(cert_der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CryptoError::InvalidCertificate(e.to_string()))?;

    Ok(cert.public_key().subject_public_key.data.to_vec())
}
