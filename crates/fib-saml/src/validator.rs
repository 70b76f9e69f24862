//! Assertion validation boundary.
//!
//! [`AssertionValidator`] turns a base64 `SAMLResponse` into a
//! [`RawProfile`]: a flat claims bag holding the federation keys plus one
//! entry per assertion attribute. Everything after this point works on the
//! bag and never sees XML.
//!
//! [`XmlAssertionValidator`] is the bundled implementation. Decryption of
//! `EncryptedAssertion` is delegated to an [`AssertionDecryptor`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::bindings::HttpPostBinding;
use crate::claims::keys;
use crate::error::{SamlError, SamlResult};
use crate::response::{Assertion, SamlResponse};
use crate::signature::XmlSignatureValidator;
use crate::trust::TrustDescriptor;
use crate::xml::XmlDocument;

/// Claims bag produced from a verified assertion.
pub type RawProfile = serde_json::Map<String, Value>;

/// Per-call validation inputs.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// Current time for condition checks.
    pub now: DateTime<Utc>,
    /// Our assertion consumer service URL. When set, `Destination` and
    /// bearer `Recipient` must match it if present.
    pub acs_url: Option<String>,
}

impl ValidationContext {
    /// Context for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self {
            now: Utc::now(),
            acs_url: None,
        }
    }

    /// Sets the expected assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.acs_url = Some(url.into());
        self
    }
}

/// Validates a SAML response and extracts its claims.
///
/// Implementations are synchronous and CPU bound.
pub trait AssertionValidator: Send + Sync {
    /// Validates `saml_response_b64` (the raw form value) against `trust`.
    ///
    /// # Errors
    ///
    /// Returns a [`SamlError`] for any protocol failure.
    fn validate(
        &self,
        trust: &TrustDescriptor,
        saml_response_b64: &str,
        ctx: &ValidationContext,
    ) -> SamlResult<RawProfile>;
}

/// Decrypts an `EncryptedAssertion` into plaintext Assertion XML.
pub trait AssertionDecryptor: Send + Sync {
    /// Returns the decrypted `<Assertion>` document.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Decryption`] if decryption fails.
    fn decrypt(&self, trust: &TrustDescriptor, encrypted_assertion_xml: &str) -> SamlResult<String>;
}

/// The bundled XML-DSig based validator.
#[derive(Clone, Default)]
pub struct XmlAssertionValidator {
    decryptor: Option<Arc<dyn AssertionDecryptor>>,
}

impl XmlAssertionValidator {
    /// Creates a validator without decryption support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decryptor for encrypted assertions.
    #[must_use]
    pub fn with_decryptor(mut self, decryptor: Arc<dyn AssertionDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }
}

impl AssertionValidator for XmlAssertionValidator {
    fn validate(
        &self,
        trust: &TrustDescriptor,
        saml_response_b64: &str,
        ctx: &ValidationContext,
    ) -> SamlResult<RawProfile> {
        let xml = HttpPostBinding::decode(saml_response_b64)?;
        let doc = XmlDocument::parse(xml)?;
        let response = SamlResponse::from_document(&doc)?;

        if !response.is_success() {
            let code = response
                .sub_status_code
                .as_deref()
                .unwrap_or(&response.status_code);
            return Err(SamlError::StatusNotSuccess(code.to_string()));
        }

        if let Some(issuer) = &response.issuer {
            check_issuer(trust, issuer)?;
        }
        if let (Some(expected), Some(actual)) = (&ctx.acs_url, &response.destination) {
            if expected != actual {
                return Err(SamlError::InvalidResponse(format!(
                    "Destination {actual} does not match {expected}"
                )));
            }
        }

        let signatures = XmlSignatureValidator::from_pem(trust.idp_certificates())?;
        if trust.want_authn_response_signed() {
            signatures.validate_element(doc.source(), response.element)?;
        }

        let decrypted;
        let (assertion_doc_source, assertion_el) =
            match (response.assertion(), response.encrypted_assertion()) {
                (Some(_), _) if trust.decrypt_assertions() => {
                    return Err(SamlError::EncryptionRequired);
                }
                (Some(el), _) => (doc.source(), el),
                (None, Some(encrypted)) => {
                    let decryptor = self.decryptor.as_ref().ok_or_else(|| {
                        SamlError::Decryption("no decryptor configured".to_string())
                    })?;
                    let plaintext = decryptor.decrypt(trust, encrypted.source(doc.source()))?;
                    decrypted = XmlDocument::parse(plaintext)?;
                    (decrypted.source(), decrypted.root())
                }
                (None, None) => return Err(SamlError::MissingElement("Assertion".to_string())),
            };

        signatures.validate_element(assertion_doc_source, assertion_el)?;

        let assertion = Assertion::from_element(assertion_el)?;
        let issuer = assertion
            .issuer
            .as_deref()
            .ok_or_else(|| SamlError::MissingElement("Assertion/Issuer".to_string()))?;
        check_issuer(trust, issuer)?;
        check_conditions(&assertion, trust, ctx)?;

        let in_response_to = response
            .in_response_to
            .clone()
            .or_else(|| assertion.subject_in_response_to.clone());

        Ok(raw_profile(&assertion, in_response_to))
    }
}

fn check_issuer(trust: &TrustDescriptor, actual: &str) -> SamlResult<()> {
    if actual == trust.idp_issuer() {
        Ok(())
    } else {
        Err(SamlError::InvalidIssuer {
            expected: trust.idp_issuer().to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Checks validity windows, bearer confirmation and audience.
pub(crate) fn check_conditions(
    assertion: &Assertion,
    trust: &TrustDescriptor,
    ctx: &ValidationContext,
) -> SamlResult<()> {
    let skew = chrono::Duration::from_std(trust.accepted_clock_skew())
        .map_err(|_| SamlError::ConditionsNotMet("clock skew out of range".to_string()))?;

    if let Some(not_before) = assertion.not_before {
        if ctx.now + skew < not_before {
            return Err(SamlError::AssertionNotYetValid);
        }
    }
    for limit in [assertion.not_on_or_after, assertion.subject_not_on_or_after]
        .into_iter()
        .flatten()
    {
        if ctx.now - skew >= limit {
            return Err(SamlError::AssertionExpired);
        }
    }

    if let (Some(expected), Some(recipient)) = (&ctx.acs_url, &assertion.recipient) {
        if expected != recipient {
            return Err(SamlError::ConditionsNotMet(format!(
                "Recipient {recipient} does not match {expected}"
            )));
        }
    }

    if !assertion
        .audiences
        .iter()
        .any(|a| a == trust.sp_entity_id())
    {
        return Err(SamlError::InvalidAudience {
            expected: trust.sp_entity_id().to_string(),
        });
    }

    Ok(())
}

/// Flattens an assertion into the claims bag.
pub(crate) fn raw_profile(assertion: &Assertion, in_response_to: Option<String>) -> RawProfile {
    let mut bag = RawProfile::new();

    // Attributes first so federation keys win on a name clash.
    for (name, values) in &assertion.attributes {
        let value = match values.as_slice() {
            [single] => Value::String(single.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        };
        bag.insert(name.clone(), value);
    }

    let mut put = |key: &str, value: Option<String>| {
        if let Some(v) = value {
            bag.insert(key.to_string(), Value::String(v));
        }
    };
    put(keys::ISSUER, assertion.issuer.clone());
    if let Some(name_id) = &assertion.name_id {
        put(keys::NAME_ID, Some(name_id.value.clone()));
        put(keys::NAME_ID_FORMAT, name_id.format.clone());
        put(keys::NAME_QUALIFIER, name_id.name_qualifier.clone());
        put(keys::SP_NAME_QUALIFIER, name_id.sp_name_qualifier.clone());
    }
    put(keys::SESSION_INDEX, assertion.session_index.clone());
    put(keys::IN_RESPONSE_TO, in_response_to);

    bag
}
