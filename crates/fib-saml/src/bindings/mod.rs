//! SAML bindings.
//!
//! - **HTTP-POST** - the identity provider posts a base64 `SAMLResponse`
//!   to the assertion consumer service.
//! - **HTTP-Redirect** - requests and logout messages travel deflated,
//!   base64 and URL-encoded in the query string, optionally signed.

mod post;
mod redirect;

pub use post::HttpPostBinding;
pub use redirect::{HttpRedirectBinding, RedirectQuery};

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// Request message (AuthnRequest, LogoutRequest).
    Request,
    /// Response message (Response, LogoutResponse).
    Response,
}

impl SamlMessageType {
    /// Returns the parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}
