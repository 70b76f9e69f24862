//! XML Signature support for SAML.
//!
//! Incoming responses carry enveloped XML-DSig signatures which
//! [`XmlSignatureValidator`] checks against the identity provider's
//! configured certificates. Outgoing requests use the HTTP-Redirect binding,
//! where the signature covers the query string; [`RedirectSigner`] produces
//! those.
//!
//! Only RSA PKCS#1 v1.5 with SHA-256/384/512 is accepted, and both the
//! reference and `SignedInfo` must use Exclusive C14N.

mod c14n;
mod signer;
mod validator;

pub use c14n::exclusive_c14n;
pub use signer::RedirectSigner;
pub use validator::XmlSignatureValidator;

use fib_crypto::{DigestAlgorithm, RsaAlgorithm};

/// The parts of a `<ds:Signature>` element needed for verification.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    /// The signature algorithm used.
    pub algorithm: RsaAlgorithm,
    /// The digest algorithm of the single reference.
    pub digest_algorithm: DigestAlgorithm,
    /// The reference URI (`#` followed by the signed element's ID).
    pub reference_uri: String,
    /// `InclusiveNamespaces` prefixes of the reference's C14N transform.
    pub reference_prefixes: Vec<String>,
    /// `InclusiveNamespaces` prefixes of the `SignedInfo` C14N method.
    pub signed_info_prefixes: Vec<String>,
    /// The digest value (base64).
    pub digest_value: String,
    /// The signature value (base64).
    pub signature_value: String,
}
