//! SAML 2.0 service-provider core for the federated identity bridge.
//!
//! The crate covers everything between an identity provider's HTTP-POST
//! and a validated, business-typed profile:
//!
//! - [`trust`] - Per-provider trust descriptors built from certificate references
//! - [`validator`] - The assertion validation boundary and the bundled XML adapter
//! - [`profile`] - Declarative business-schema validation
//! - [`claims`] - Splitting federation claims from business attributes
//! - [`relay`] - Same-origin validation of RelayState redirect targets
//! - [`request`] / [`metadata`] - Outgoing AuthnRequest, LogoutRequest and SP metadata
//! - [`bindings`] / [`signature`] - HTTP-POST and HTTP-Redirect bindings, XML-DSig
//!
//! Nothing here performs I/O after startup except what callers feed in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod claims;
pub mod constants;
pub mod error;
pub mod metadata;
pub mod profile;
pub mod relay;
pub mod request;
pub mod response;
pub mod signature;
#[cfg(test)]
mod test_keys;
pub mod trust;
pub mod validator;
pub mod xml;

pub use claims::{split_claims, ClaimsError, FederationSessionClaims};
pub use error::{SamlError, SamlResult};
pub use profile::{FieldType, ProfileSchema, ProfileValidationError, ValidatedProfile};
pub use relay::resolve_redirect;
pub use trust::{
    CertificateRef, TrustDescriptor, TrustError, TrustResolver, TrustSettings,
    WellKnownCertificates,
};
pub use validator::{
    AssertionDecryptor, AssertionValidator, RawProfile, ValidationContext, XmlAssertionValidator,
};
