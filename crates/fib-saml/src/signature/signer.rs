//! Signing for HTTP-Redirect binding messages.

use std::fmt;

use base64::Engine;
use fib_crypto::RsaAlgorithm;

use crate::error::{SamlError, SamlResult};
use crate::trust::TrustDescriptor;

/// Signs redirect-binding query strings with the service provider's key.
pub struct RedirectSigner {
    /// The private key in DER format.
    private_key_der: Vec<u8>,
    algorithm: RsaAlgorithm,
}

impl RedirectSigner {
    /// Creates a signer from a DER private key.
    #[must_use]
    pub const fn new(private_key_der: Vec<u8>, algorithm: RsaAlgorithm) -> Self {
        Self {
            private_key_der,
            algorithm,
        }
    }

    /// Creates a signer from a PEM private key (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be decoded.
    pub fn from_pem(private_key_pem: &str, algorithm: RsaAlgorithm) -> SamlResult<Self> {
        let der = fib_crypto::private_key_der(private_key_pem)?;
        Ok(Self::new(der, algorithm))
    }

    /// Creates a signer from a trust descriptor's key and algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key cannot be decoded.
    pub fn for_trust(trust: &TrustDescriptor) -> SamlResult<Self> {
        Self::from_pem(trust.private_key_pem(), trust.signature_algorithm())
    }

    /// The signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> RsaAlgorithm {
        self.algorithm
    }

    /// Signs `query` and returns the base64 signature value.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureCreation`] if the key is unusable.
    pub fn sign(&self, query: &str) -> SamlResult<String> {
        let sig = fib_crypto::rsa_sign(&self.private_key_der, query.as_bytes(), self.algorithm)
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(sig))
    }
}

impl fmt::Debug for RedirectSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
