//! Key material shared by unit tests; the same files back the integration
//! tests.

/// Identity provider certificate.
pub const IDP_CERT: &str = include_str!("../../../tests/integration/fixtures/idp-cert.pem");
/// Identity provider signing key.
pub const IDP_KEY: &str = include_str!("../../../tests/integration/fixtures/idp-key.pem");
/// Service provider certificate.
pub const SP_CERT: &str = include_str!("../../../tests/integration/fixtures/sp-cert.pem");
/// Service provider signing key.
pub const SP_KEY: &str = include_str!("../../../tests/integration/fixtures/sp-key.pem");
