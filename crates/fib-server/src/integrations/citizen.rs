//! Citizen logins through the national identity provider.

use std::sync::LazyLock;

use async_trait::async_trait;
use fib_saml::{FederationSessionClaims, FieldType, ProfileSchema, ValidatedProfile};
use fib_session::profile::fields;
use fib_session::{CitizenProfile, IdentityResolver, ResolveError, SessionUser};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::identity_service::IdentityServiceClient;

/// Assertion attribute keys.
pub mod attributes {
    /// National identification number.
    pub const SSN: &str = "urn:oid:1.2.246.21";
    /// Given name.
    pub const FIRST_NAME: &str = "urn:oid:2.5.4.42";
    /// Surname.
    pub const LAST_NAME: &str = "urn:oid:2.5.4.4";
}

/// Finnish personal identity code: date, century sign, individual number
/// and check character.
static SSN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{6}[-+ABCDEFUVWXY][0-9]{3}[0-9A-FHJ-NPR-Y]$").ok()
});

/// Business schema for citizen assertions.
#[must_use]
pub fn schema() -> ProfileSchema {
    ProfileSchema::new()
        .required(attributes::SSN, fields::SOCIAL_SECURITY_NUMBER, FieldType::String)
        .required(attributes::FIRST_NAME, fields::FIRST_NAME, FieldType::String)
        .required(attributes::LAST_NAME, fields::LAST_NAME, FieldType::String)
}

/// Returns whether `ssn` looks like a personal identity code.
#[must_use]
pub fn is_valid_ssn(ssn: &str) -> bool {
    SSN_PATTERN.as_ref().is_some_and(|re| re.is_match(ssn))
}

#[derive(Deserialize)]
struct CitizenUser {
    id: Uuid,
}

/// Resolves citizens with `POST /system/citizen-login`.
#[derive(Debug, Clone)]
pub struct CitizenResolver {
    client: IdentityServiceClient,
}

impl CitizenResolver {
    /// Creates the resolver.
    #[must_use]
    pub const fn new(client: IdentityServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityResolver for CitizenResolver {
    async fn resolve(
        &self,
        profile: &ValidatedProfile,
        federation: Option<&FederationSessionClaims>,
    ) -> Result<SessionUser, ResolveError> {
        let issuer = federation.map_or("", |f| f.issuer.as_str());
        let citizen = CitizenProfile::from_validated(profile, issuer)
            .map_err(|e| ResolveError::Profile(e.to_string()))?;

        // Identity providers have been seen to assert test and legacy
        // codes; those still resolve.
        if !is_valid_ssn(&citizen.social_security_number) {
            tracing::warn!(issuer, "social security number has an unexpected format");
        }

        let user: CitizenUser = self.client.post("/system/citizen-login", &citizen).await?;
        Ok(SessionUser::citizen(user.id)?)
    }
}
