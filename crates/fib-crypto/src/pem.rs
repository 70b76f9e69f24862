//! PEM armor decoding.

use base64::Engine;

use crate::error::CryptoError;

/// Returns the base64 body between the `BEGIN`/`END` lines for `label`,
/// with all whitespace removed.
///
/// # Errors
///
/// Returns an error if either armor line is missing or the body is empty.
pub fn pem_body(pem: &str, label: &str) -> Result<String, CryptoError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem
        .find(&begin)
        .map(|pos| pos + begin.len())
        .ok_or_else(|| CryptoError::InvalidPem(format!("missing BEGIN {label} line")))?;
    let end_pos = pem[start..]
        .find(&end)
        .map(|pos| start + pos)
        .ok_or_else(|| CryptoError::InvalidPem(format!("missing END {label} line")))?;

    let body: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if body.is_empty() {
        return Err(CryptoError::InvalidPem(format!("empty {label} body")));
    }
    Ok(body)
}

/// Decodes a PEM block with the given label into DER bytes.
///
/// # Errors
///
/// Returns an error if the armor is missing or the body is not base64.
pub fn pem_to_der(pem: &str, label: &str) -> Result<Vec<u8>, CryptoError> {
    let body = pem_body(pem, label)?;
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| CryptoError::InvalidPem(format!("{label} body is not base64: {e}")))
}

/// Decodes a private key in either PKCS#8 or PKCS#1 armor.
///
/// # Errors
///
/// Returns an error if neither armor is present.
pub fn private_key_der(pem: &str) -> Result<Vec<u8>, CryptoError> {
    pem_to_der(pem, "PRIVATE KEY").or_else(|_| pem_to_der(pem, "RSA PRIVATE KEY"))
}
