//! HTTP-Redirect binding.
//!
//! Messages travel in the query string, DEFLATE-compressed and base64
//! encoded. When signed, the signature covers the exact octets
//! `SAMLRequest=…&RelayState=…&SigAlg=…` (or `SAMLResponse=…`) as they
//! appear on the wire, so verification works from the raw query string.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};
use crate::signature::{RedirectSigner, XmlSignatureValidator};

use super::SamlMessageType;

/// Largest decompressed message accepted from the redirect binding.
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes `xml` into a redirect URL on `destination`.
    ///
    /// With a signer, `SigAlg` and `Signature` are appended.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or signing fails.
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        signer: Option<&RedirectSigner>,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);

        let mut query = format!(
            "{}={}",
            message_type.form_param(),
            urlencoding::encode(&encoded)
        );
        if let Some(rs) = relay_state.filter(|rs| !rs.is_empty()) {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(rs));
        }
        if let Some(signer) = signer {
            query.push_str("&SigAlg=");
            query.push_str(&urlencoding::encode(signer.algorithm().uri()));
            let signature = signer.sign(&query)?;
            query.push_str("&Signature=");
            query.push_str(&urlencoding::encode(&signature));
        }

        let separator = if destination.contains('?') { '&' } else { '?' };
        Ok(format!("{destination}{separator}{query}"))
    }

    /// Decodes a URL-decoded message parameter value into XML.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid base64, DEFLATE or UTF-8, or for a
    /// message that inflates past [`MAX_MESSAGE_BYTES`].
    pub fn decode(encoded: &str) -> SamlResult<String> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let compressed = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let xml_bytes = deflate_decompress(&compressed)?;
        String::from_utf8(xml_bytes)
            .map_err(|e| SamlError::InvalidRequest(format!("invalid UTF-8 in message: {e}")))
    }
}

/// The SAML parameters of a redirect-binding query string.
#[derive(Debug, Clone)]
pub struct RedirectQuery {
    /// Whether this carries a request or a response.
    pub message_type: SamlMessageType,
    /// The message parameter, URL-decoded (still deflated and base64).
    pub message: String,
    /// RelayState, URL-decoded.
    pub relay_state: Option<String>,
    /// SigAlg, URL-decoded.
    pub sig_alg: Option<String>,
    /// Signature, URL-decoded.
    pub signature: Option<String>,
    /// The signed portion of the query in its original encoding.
    signed_query: String,
}

impl RedirectQuery {
    /// Parses a raw query string (without the leading `?`).
    ///
    /// # Errors
    ///
    /// Returns an error if neither `SAMLRequest` nor `SAMLResponse` is
    /// present or a value is not valid percent-encoding.
    pub fn parse(raw_query: &str) -> SamlResult<Self> {
        let mut message: Option<(SamlMessageType, &str)> = None;
        let mut relay_state = None;
        let mut sig_alg = None;
        let mut signature = None;

        for pair in raw_query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "SAMLRequest" => message = Some((SamlMessageType::Request, value)),
                "SAMLResponse" => message = Some((SamlMessageType::Response, value)),
                "RelayState" => relay_state = Some(value),
                "SigAlg" => sig_alg = Some(value),
                "Signature" => signature = Some(value),
                _ => {}
            }
        }

        let (message_type, raw_message) = message.ok_or_else(|| {
            SamlError::InvalidRequest("no SAMLRequest or SAMLResponse parameter".to_string())
        })?;

        let mut signed_query = format!("{}={raw_message}", message_type.form_param());
        if let Some(rs) = relay_state {
            signed_query.push_str("&RelayState=");
            signed_query.push_str(rs);
        }
        if let Some(alg) = sig_alg {
            signed_query.push_str("&SigAlg=");
            signed_query.push_str(alg);
        }

        Ok(Self {
            message_type,
            message: url_decode(raw_message)?,
            relay_state: relay_state.map(url_decode).transpose()?,
            sig_alg: sig_alg.map(url_decode).transpose()?,
            signature: signature.map(url_decode).transpose()?,
            signed_query,
        })
    }

    /// Decodes the carried message into XML.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be decoded.
    pub fn xml(&self) -> SamlResult<String> {
        HttpRedirectBinding::decode(&self.message)
    }

    /// Returns true when the query carries a signature.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Verifies the query signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is unsigned or the signature does not
    /// verify.
    pub fn verify(&self, validator: &XmlSignatureValidator) -> SamlResult<()> {
        let (Some(signature), Some(sig_alg)) = (&self.signature, &self.sig_alg) else {
            return Err(SamlError::SignatureInvalid(
                "query is not signed".to_string(),
            ));
        };
        validator.validate_redirect_binding(&self.signed_query, signature, sig_alg)
    }

    /// The signed portion of the query string.
    #[must_use]
    pub fn signed_query(&self) -> &str {
        &self.signed_query
    }
}

fn url_decode(value: &str) -> SamlResult<String> {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .map_err(|e| SamlError::InvalidRequest(format!("URL decode error: {e}")))
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("compression finish error: {e}")))
}

/// Decompresses raw DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let limit = u64::try_from(MAX_MESSAGE_BYTES).unwrap_or(u64::MAX);
    let mut decoder = DeflateDecoder::new(data).take(limit + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("decompression error: {e}")))?;
    if decompressed.len() > MAX_MESSAGE_BYTES {
        return Err(SamlError::Deflate(format!(
            "message inflates past {MAX_MESSAGE_BYTES} bytes"
        )));
    }
    Ok(decompressed)
}
