//! Outgoing SAML requests.
//!
//! Both messages are sent over the HTTP-Redirect binding, so they carry no
//! embedded signature. The query string is signed instead.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;

use crate::claims::FederationSessionClaims;
use crate::constants::{SamlBinding, AUTHN_CONTEXT_PASSWORD_PROTECTED_TRANSPORT, SAMLP_NS, SAML_NS};
use crate::trust::TrustDescriptor;

fn instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Authentication request sent to the identity provider.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    /// Message id, recorded for `InResponseTo` checks.
    pub id: String,
    /// Creation time.
    pub issue_instant: DateTime<Utc>,
    /// Identity provider SSO URL.
    pub destination: String,
    /// Our assertion consumer service URL.
    pub acs_url: String,
    /// Our entity id.
    pub issuer: String,
    /// Requested NameID format.
    pub name_id_format: String,
    /// Whether `RequestedAuthnContext` is included.
    pub request_authn_context: bool,
}

impl AuthnRequest {
    /// Builds a request for `trust` with a fresh id.
    #[must_use]
    pub fn new(trust: &TrustDescriptor, destination: &str, acs_url: &str) -> Self {
        Self {
            id: fib_crypto::generate_request_id(),
            issue_instant: Utc::now(),
            destination: destination.to_string(),
            acs_url: acs_url.to_string(),
            issuer: trust.sp_entity_id().to_string(),
            name_id_format: trust.name_id_format().to_string(),
            request_authn_context: !trust.disable_requested_authn_context(),
        }
    }

    /// Serializes the request.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let authn_context = if self.request_authn_context {
            format!(
                r#"<samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef>{AUTHN_CONTEXT_PASSWORD_PROTECTED_TRANSPORT}</saml:AuthnContextClassRef></samlp:RequestedAuthnContext>"#
            )
        } else {
            String::new()
        };

        format!(
            r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{id}" Version="2.0" IssueInstant="{instant}" Destination="{destination}" AssertionConsumerServiceURL="{acs}" ProtocolBinding="{binding}"><saml:Issuer>{issuer}</saml:Issuer><samlp:NameIDPolicy Format="{format}" AllowCreate="true"/>{authn_context}</samlp:AuthnRequest>"#,
            id = escape(&self.id),
            instant = instant(self.issue_instant),
            destination = escape(&self.destination),
            acs = escape(&self.acs_url),
            binding = SamlBinding::HttpPost.uri(),
            issuer = escape(&self.issuer),
            format = escape(&self.name_id_format),
        )
    }
}

/// Logout request addressing the identity provider session of a login.
#[derive(Debug, Clone)]
pub struct LogoutRequest {
    /// Message id.
    pub id: String,
    /// Creation time.
    pub issue_instant: DateTime<Utc>,
    /// Identity provider logout URL.
    pub destination: String,
    /// Our entity id.
    pub issuer: String,
    /// Claims of the session being ended.
    pub claims: FederationSessionClaims,
}

impl LogoutRequest {
    /// Builds a logout request for the session described by `claims`.
    #[must_use]
    pub fn new(trust: &TrustDescriptor, destination: &str, claims: FederationSessionClaims) -> Self {
        Self {
            id: fib_crypto::generate_request_id(),
            issue_instant: Utc::now(),
            destination: destination.to_string(),
            issuer: trust.sp_entity_id().to_string(),
            claims,
        }
    }

    /// Serializes the request.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut name_id_attrs = format!(r#" Format="{}""#, escape(&self.claims.name_id_format));
        if let Some(q) = &self.claims.name_qualifier {
            name_id_attrs.push_str(&format!(r#" NameQualifier="{}""#, escape(q)));
        }
        if let Some(q) = &self.claims.sp_name_qualifier {
            name_id_attrs.push_str(&format!(r#" SPNameQualifier="{}""#, escape(q)));
        }
        let session_index = self
            .claims
            .session_index
            .as_deref()
            .map(|s| format!("<samlp:SessionIndex>{}</samlp:SessionIndex>", escape(s)))
            .unwrap_or_default();

        format!(
            r#"<samlp:LogoutRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{id}" Version="2.0" IssueInstant="{instant}" Destination="{destination}"><saml:Issuer>{issuer}</saml:Issuer><saml:NameID{name_id_attrs}>{name_id}</saml:NameID>{session_index}</samlp:LogoutRequest>"#,
            id = escape(&self.id),
            instant = instant(self.issue_instant),
            destination = escape(&self.destination),
            issuer = escape(&self.issuer),
            name_id = escape(&self.claims.name_id),
        )
    }
}
