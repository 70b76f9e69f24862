//! Incoming SAML protocol messages.
//!
//! Thin typed views over [`XmlDocument`] for the messages the service
//! provider receives: `Response`, the `Assertion` inside it, and
//! `LogoutResponse`. Signature checks operate on the underlying document,
//! so each view keeps a reference to the element it was read from.

use chrono::{DateTime, Utc};

use crate::constants::status_codes;
use crate::error::{SamlError, SamlResult};
use crate::xml::{XmlDocument, XmlElement};

fn parse_instant(value: Option<&str>, what: &str) -> SamlResult<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| SamlError::InvalidResponse(format!("{what} is not a timestamp: {e}")))
        })
        .transpose()
}

fn status_of(el: &XmlElement) -> SamlResult<(String, Option<String>, Option<String>)> {
    let status = el
        .child("Status")
        .ok_or_else(|| SamlError::MissingElement("Status".to_string()))?;
    let code_el = status
        .child("StatusCode")
        .ok_or_else(|| SamlError::MissingElement("StatusCode".to_string()))?;
    let code = code_el
        .attr("Value")
        .ok_or_else(|| SamlError::MissingElement("StatusCode/@Value".to_string()))?
        .to_string();
    let sub_code = code_el
        .child("StatusCode")
        .and_then(|c| c.attr("Value"))
        .map(String::from);
    let message = status
        .child("StatusMessage")
        .and_then(XmlElement::text_trimmed)
        .map(String::from);
    Ok((code, sub_code, message))
}

/// A `samlp:Response`.
#[derive(Debug)]
pub struct SamlResponse<'a> {
    /// The element the view was read from.
    pub element: &'a XmlElement,
    /// Response ID.
    pub id: Option<String>,
    /// Request this responds to.
    pub in_response_to: Option<String>,
    /// Intended recipient URL.
    pub destination: Option<String>,
    /// Response-level issuer.
    pub issuer: Option<String>,
    /// Top-level status code.
    pub status_code: String,
    /// Second-level status code.
    pub sub_status_code: Option<String>,
    /// Status message.
    pub status_message: Option<String>,
}

impl<'a> SamlResponse<'a> {
    /// Reads the root of `doc` as a Response.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a Response or has no status.
    pub fn from_document(doc: &'a XmlDocument) -> SamlResult<Self> {
        let el = doc.root();
        if el.name != "Response" {
            return Err(SamlError::InvalidResponse(format!(
                "expected Response, got {}",
                el.name
            )));
        }
        let (status_code, sub_status_code, status_message) = status_of(el)?;
        Ok(Self {
            element: el,
            id: el.attr("ID").map(String::from),
            in_response_to: el.attr("InResponseTo").map(String::from),
            destination: el.attr("Destination").map(String::from),
            issuer: el
                .child("Issuer")
                .and_then(XmlElement::text_trimmed)
                .map(String::from),
            status_code,
            sub_status_code,
            status_message,
        })
    }

    /// Returns true when the top-level status is Success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == status_codes::SUCCESS
    }

    /// The plaintext assertion, if any.
    #[must_use]
    pub fn assertion(&self) -> Option<&'a XmlElement> {
        self.element.child("Assertion")
    }

    /// The encrypted assertion, if any.
    #[must_use]
    pub fn encrypted_assertion(&self) -> Option<&'a XmlElement> {
        self.element.child("EncryptedAssertion")
    }
}

/// Subject NameID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameId {
    /// The identifier value.
    pub value: String,
    /// Format URI.
    pub format: Option<String>,
    /// Name qualifier.
    pub name_qualifier: Option<String>,
    /// SP name qualifier.
    pub sp_name_qualifier: Option<String>,
}

/// A `saml:Assertion`, reduced to what the service provider consumes.
#[derive(Debug, Clone)]
pub struct Assertion {
    /// Assertion ID.
    pub id: Option<String>,
    /// Asserting party.
    pub issuer: Option<String>,
    /// Subject NameID.
    pub name_id: Option<NameId>,
    /// Bearer confirmation expiry.
    pub subject_not_on_or_after: Option<DateTime<Utc>>,
    /// Bearer confirmation recipient.
    pub recipient: Option<String>,
    /// Bearer confirmation `InResponseTo`.
    pub subject_in_response_to: Option<String>,
    /// Conditions lower bound.
    pub not_before: Option<DateTime<Utc>>,
    /// Conditions upper bound.
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// Audience restriction entries.
    pub audiences: Vec<String>,
    /// Session index from the authentication statement.
    pub session_index: Option<String>,
    /// Attributes by name, values in document order.
    pub attributes: Vec<(String, Vec<String>)>,
}

impl Assertion {
    /// Reads an Assertion element.
    ///
    /// # Errors
    ///
    /// Returns an error if `el` is not an Assertion or a timestamp is
    /// malformed.
    pub fn from_element(el: &XmlElement) -> SamlResult<Self> {
        if el.name != "Assertion" {
            return Err(SamlError::InvalidResponse(format!(
                "expected Assertion, got {}",
                el.name
            )));
        }

        let subject = el.child("Subject");
        let name_id = subject.and_then(|s| s.child("NameID")).and_then(|n| {
            n.text_trimmed().map(|value| NameId {
                value: value.to_string(),
                format: n.attr("Format").map(String::from),
                name_qualifier: n.attr("NameQualifier").map(String::from),
                sp_name_qualifier: n.attr("SPNameQualifier").map(String::from),
            })
        });
        let confirmation_data = subject
            .and_then(|s| s.child("SubjectConfirmation"))
            .and_then(|c| c.child("SubjectConfirmationData"));

        let conditions = el.child("Conditions");
        let audiences = conditions
            .map(|c| {
                c.children_named("AudienceRestriction")
                    .flat_map(|r| r.children_named("Audience"))
                    .filter_map(XmlElement::text_trimmed)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let attributes = el
            .children_named("AttributeStatement")
            .flat_map(|s| s.children_named("Attribute"))
            .filter_map(|a| {
                let name = a.attr("Name")?.to_string();
                let values = a
                    .children_named("AttributeValue")
                    .map(|v| v.text.trim().to_string())
                    .collect();
                Some((name, values))
            })
            .collect();

        Ok(Self {
            id: el.attr("ID").map(String::from),
            issuer: el
                .child("Issuer")
                .and_then(XmlElement::text_trimmed)
                .map(String::from),
            name_id,
            subject_not_on_or_after: parse_instant(
                confirmation_data.and_then(|d| d.attr("NotOnOrAfter")),
                "SubjectConfirmationData/@NotOnOrAfter",
            )?,
            recipient: confirmation_data
                .and_then(|d| d.attr("Recipient"))
                .map(String::from),
            subject_in_response_to: confirmation_data
                .and_then(|d| d.attr("InResponseTo"))
                .map(String::from),
            not_before: parse_instant(
                conditions.and_then(|c| c.attr("NotBefore")),
                "Conditions/@NotBefore",
            )?,
            not_on_or_after: parse_instant(
                conditions.and_then(|c| c.attr("NotOnOrAfter")),
                "Conditions/@NotOnOrAfter",
            )?,
            audiences,
            session_index: el
                .child("AuthnStatement")
                .and_then(|s| s.attr("SessionIndex"))
                .map(String::from),
            attributes,
        })
    }
}

/// A `samlp:LogoutResponse`.
#[derive(Debug, Clone)]
pub struct LogoutResponse {
    /// Response ID.
    pub id: Option<String>,
    /// Request this responds to.
    pub in_response_to: Option<String>,
    /// Issuer.
    pub issuer: Option<String>,
    /// Top-level status code.
    pub status_code: String,
    /// Second-level status code.
    pub sub_status_code: Option<String>,
}

impl LogoutResponse {
    /// Reads the root of `doc` as a LogoutResponse.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a LogoutResponse or has no status.
    pub fn from_document(doc: &XmlDocument) -> SamlResult<Self> {
        let el = doc.root();
        if el.name != "LogoutResponse" {
            return Err(SamlError::InvalidResponse(format!(
                "expected LogoutResponse, got {}",
                el.name
            )));
        }
        let (status_code, sub_status_code, _) = status_of(el)?;
        Ok(Self {
            id: el.attr("ID").map(String::from),
            in_response_to: el.attr("InResponseTo").map(String::from),
            issuer: el
                .child("Issuer")
                .and_then(XmlElement::text_trimmed)
                .map(String::from),
            status_code,
            sub_status_code,
        })
    }

    /// Returns true when the top-level status is Success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == status_codes::SUCCESS
    }
}
