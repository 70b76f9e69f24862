//! HTTP-POST binding.

use base64::Engine;

use crate::error::{SamlError, SamlResult};

/// HTTP-POST binding decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Decodes a base64 `SAMLResponse` form value into XML.
    ///
    /// Line breaks inserted by some identity providers are tolerated.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, invalid base64 or non-UTF-8 content.
    pub fn decode(encoded: &str) -> SamlResult<String> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(SamlError::InvalidResponse(
                "empty SAMLResponse parameter".to_string(),
            ));
        }

        let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;

        String::from_utf8(decoded)
            .map_err(|e| SamlError::InvalidResponse(format!("invalid UTF-8 in message: {e}")))
    }
}
