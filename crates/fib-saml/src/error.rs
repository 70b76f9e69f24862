//! SAML error types.
//!
//! [`SamlError`] covers protocol failures: anything wrong with the message
//! an identity provider sent us. Business-schema problems live in
//! [`crate::profile::ProfileValidationError`] and configuration problems in
//! [`crate::trust::TrustError`].

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Invalid SAML request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid SAML response format or content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XML signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// Signing an outgoing message failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Top-level status was not Success.
    #[error("identity provider returned status {0}")]
    StatusNotSuccess(String),

    /// Assertion conditions not met.
    #[error("assertion conditions not met: {0}")]
    ConditionsNotMet(String),

    /// Assertion expired.
    #[error("assertion expired")]
    AssertionExpired,

    /// Assertion not yet valid.
    #[error("assertion not yet valid")]
    AssertionNotYetValid,

    /// Audience restriction does not include this service provider.
    #[error("invalid audience: expected {expected}")]
    InvalidAudience {
        /// The expected audience URI.
        expected: String,
    },

    /// Invalid issuer.
    #[error("invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer {
        /// The expected issuer.
        expected: String,
        /// The actual issuer.
        actual: String,
    },

    /// A plaintext assertion arrived where encryption is required.
    #[error("assertion must be encrypted")]
    EncryptionRequired,

    /// Assertion decryption failed or no decryptor is configured.
    #[error("assertion decryption failed: {0}")]
    Decryption(String),

    /// `InResponseTo` did not match an outstanding request.
    #[error("unexpected InResponseTo: {0}")]
    UnexpectedInResponseTo(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SamlError {
    /// Returns the HTTP status code for this error when it is not turned
    /// into a redirect.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::MissingElement(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::XmlParse(_) => 400,
            Self::SignatureInvalid(_)
            | Self::StatusNotSuccess(_)
            | Self::AssertionExpired
            | Self::AssertionNotYetValid
            | Self::InvalidAudience { .. }
            | Self::InvalidIssuer { .. }
            | Self::EncryptionRequired
            | Self::UnexpectedInResponseTo(_)
            | Self::ConditionsNotMet(_) => 401,
            _ => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<fib_crypto::CryptoError> for SamlError {
    fn from(err: fib_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}
