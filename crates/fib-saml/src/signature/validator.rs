//! XML Signature validation.

use base64::Engine;
use fib_crypto::{DigestAlgorithm, RsaAlgorithm};

use crate::constants::canonicalization_algorithms::{ENVELOPED_SIGNATURE, EXCLUSIVE_C14N};
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

use super::{exclusive_c14n, XmlSignature};

/// XML signature validator.
///
/// Holds the identity provider's trusted certificates. A signature is
/// accepted if it verifies against any of them, which lets the provider
/// rotate keys while both certificates are configured. Certificates embedded
/// in the signature's `KeyInfo` are ignored.
pub struct XmlSignatureValidator {
    /// Trusted certificates (DER).
    trusted_certificates: Vec<Vec<u8>>,
}

impl XmlSignatureValidator {
    /// Creates a new validator with the given trusted certificates.
    #[must_use]
    pub const fn new(trusted_certificates: Vec<Vec<u8>>) -> Self {
        Self {
            trusted_certificates,
        }
    }

    /// Creates a validator from PEM-encoded certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate is not PEM.
    pub fn from_pem<S: AsRef<str>>(certificates_pem: &[S]) -> SamlResult<Self> {
        let certs = certificates_pem
            .iter()
            .map(|pem| fib_crypto::pem_to_der(pem.as_ref(), "CERTIFICATE"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(certs))
    }

    /// Validates the enveloped signature of `element`.
    ///
    /// The signature must be a direct child of `element` and its single
    /// reference must point at the element's `ID`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the element is unsigned,
    /// the reference or digest does not match, or no trusted certificate
    /// verifies the signature.
    pub fn validate_element(&self, document: &str, element: &XmlElement) -> SamlResult<()> {
        let sig_el = element.child("Signature").ok_or_else(|| {
            SamlError::SignatureInvalid(format!("{} is not signed", element.name))
        })?;
        let signature = extract_signature(sig_el)?;

        let id = element
            .attr("ID")
            .ok_or_else(|| SamlError::SignatureInvalid(format!("{} has no ID", element.name)))?;
        if signature.reference_uri.strip_prefix('#') != Some(id) {
            return Err(SamlError::SignatureInvalid(
                "signature does not reference the signed element".to_string(),
            ));
        }

        verify_digest(document, element, sig_el, &signature)?;

        let signed_info = sig_el
            .child("SignedInfo")
            .ok_or_else(|| SamlError::SignatureInvalid("no SignedInfo".to_string()))?;
        let canonical_signed_info = exclusive_c14n(
            document,
            signed_info.span.clone(),
            None,
            &signature.signed_info_prefixes,
        )?;
        let signature_bytes = decode_b64(&signature.signature_value, "signature")?;

        self.verify_with_any(
            canonical_signed_info.as_bytes(),
            &signature_bytes,
            signature.algorithm,
        )
    }

    /// Validates a detached signature for HTTP-Redirect binding.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown algorithm, undecodable signature, or
    /// a signature no trusted certificate verifies.
    pub fn validate_redirect_binding(
        &self,
        signed_query: &str,
        signature_b64: &str,
        sig_alg: &str,
    ) -> SamlResult<()> {
        let algorithm = RsaAlgorithm::from_uri(sig_alg).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("unsupported signature algorithm: {sig_alg}"))
        })?;
        let signature = decode_b64(signature_b64, "signature")?;
        self.verify_with_any(signed_query.as_bytes(), &signature, algorithm)
    }

    fn verify_with_any(&self, data: &[u8], signature: &[u8], algorithm: RsaAlgorithm) -> SamlResult<()> {
        for cert_der in &self.trusted_certificates {
            let public_key = match fib_crypto::certificate_public_key(cert_der) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparseable trusted certificate");
                    continue;
                }
            };
            if fib_crypto::rsa_verify(&public_key, data, signature, algorithm) {
                return Ok(());
            }
        }

        Err(SamlError::SignatureInvalid(
            "signature verification failed with all trusted certificates".to_string(),
        ))
    }
}

fn decode_b64(value: &str, what: &str) -> SamlResult<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| SamlError::SignatureInvalid(format!("invalid {what} encoding: {e}")))
}

/// Reads the algorithm identifiers and values out of a Signature element.
fn extract_signature(sig_el: &XmlElement) -> SamlResult<XmlSignature> {
    let invalid = |what: &str| SamlError::SignatureInvalid(format!("no {what} found"));

    let signed_info = sig_el.child("SignedInfo").ok_or_else(|| invalid("SignedInfo"))?;

    let c14n_method = signed_info
        .child("CanonicalizationMethod")
        .ok_or_else(|| invalid("CanonicalizationMethod"))?;
    let signed_info_prefixes = exclusive_prefixes(c14n_method)?;

    let method = signed_info
        .child("SignatureMethod")
        .and_then(|m| m.attr("Algorithm"))
        .ok_or_else(|| invalid("SignatureMethod"))?;
    let algorithm = RsaAlgorithm::from_uri(method).ok_or_else(|| {
        SamlError::SignatureInvalid(format!("unsupported signature algorithm: {method}"))
    })?;

    let mut references = signed_info.children_named("Reference");
    let reference = references.next().ok_or_else(|| invalid("Reference"))?;
    if references.next().is_some() {
        return Err(SamlError::SignatureInvalid(
            "multiple references are not supported".to_string(),
        ));
    }

    let mut reference_prefixes = Vec::new();
    for transform in reference
        .child("Transforms")
        .into_iter()
        .flat_map(|t| t.children_named("Transform"))
    {
        if transform.attr("Algorithm") == Some(ENVELOPED_SIGNATURE) {
            continue;
        }
        reference_prefixes = exclusive_prefixes(transform)?;
    }

    let digest_method = reference
        .child("DigestMethod")
        .and_then(|m| m.attr("Algorithm"))
        .ok_or_else(|| invalid("DigestMethod"))?;
    let digest_algorithm = DigestAlgorithm::from_uri(digest_method).ok_or_else(|| {
        SamlError::SignatureInvalid(format!("unsupported digest algorithm: {digest_method}"))
    })?;

    Ok(XmlSignature {
        algorithm,
        digest_algorithm,
        reference_uri: reference.attr("URI").unwrap_or_default().to_string(),
        reference_prefixes,
        signed_info_prefixes,
        digest_value: reference
            .child("DigestValue")
            .and_then(XmlElement::text_trimmed)
            .ok_or_else(|| invalid("DigestValue"))?
            .to_string(),
        signature_value: sig_el
            .child("SignatureValue")
            .and_then(XmlElement::text_trimmed)
            .ok_or_else(|| invalid("SignatureValue"))?
            .to_string(),
    })
}

/// Checks that `method` is Exclusive C14N and returns its
/// `InclusiveNamespaces` prefix list.
fn exclusive_prefixes(method: &XmlElement) -> SamlResult<Vec<String>> {
    let algorithm = method.attr("Algorithm").unwrap_or_default();
    if algorithm != EXCLUSIVE_C14N {
        return Err(SamlError::SignatureInvalid(format!(
            "unsupported canonicalization: {algorithm}"
        )));
    }
    Ok(method
        .child("InclusiveNamespaces")
        .and_then(|n| n.attr("PrefixList"))
        .map(|list| list.split_whitespace().map(String::from).collect())
        .unwrap_or_default())
}

/// Verifies the reference digest over the canonical element with its
/// signature removed.
fn verify_digest(
    document: &str,
    element: &XmlElement,
    sig_el: &XmlElement,
    signature: &XmlSignature,
) -> SamlResult<()> {
    let canonical = exclusive_c14n(
        document,
        element.span.clone(),
        Some(sig_el.span.clone()),
        &signature.reference_prefixes,
    )?;

    let calculated = fib_crypto::digest(signature.digest_algorithm, canonical.as_bytes());
    let expected = decode_b64(&signature.digest_value, "digest")?;

    if fib_crypto::digests_equal(&calculated, &expected) {
        Ok(())
    } else {
        Err(SamlError::SignatureInvalid("digest value mismatch".to_string()))
    }
}
