//! Employee logins through the organisation directory.

use async_trait::async_trait;
use fib_saml::{FederationSessionClaims, FieldType, ProfileSchema, ValidatedProfile};
use fib_session::profile::fields;
use fib_session::{EmployeeProfile, IdentityResolver, ResolveError, SessionUser, UserType};
use serde::Deserialize;
use uuid::Uuid;

use crate::identity_service::IdentityServiceClient;

/// Assertion attribute keys.
pub mod attributes {
    /// Directory object id.
    pub const OBJECT_ID: &str = "http://schemas.microsoft.com/identity/claims/objectidentifier";
    /// Given name.
    pub const FIRST_NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname";
    /// Surname.
    pub const LAST_NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname";
    /// Email address.
    pub const EMAIL: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";
}

/// Business schema for employee assertions.
#[must_use]
pub fn schema() -> ProfileSchema {
    ProfileSchema::new()
        .required(attributes::OBJECT_ID, fields::OBJECT_ID, FieldType::String)
        .required(attributes::FIRST_NAME, fields::FIRST_NAME, FieldType::String)
        .required(attributes::LAST_NAME, fields::LAST_NAME, FieldType::String)
        .optional(attributes::EMAIL, fields::EMAIL, FieldType::String)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeUser {
    id: Uuid,
    #[serde(default)]
    global_roles: Vec<String>,
    #[serde(default)]
    all_scoped_roles: Vec<String>,
}

/// Resolves employees with `POST /system/employee-login`.
#[derive(Debug, Clone)]
pub struct EmployeeResolver {
    client: IdentityServiceClient,
    external_id_prefix: String,
}

impl EmployeeResolver {
    /// Creates the resolver.
    #[must_use]
    pub const fn new(client: IdentityServiceClient, external_id_prefix: String) -> Self {
        Self {
            client,
            external_id_prefix,
        }
    }
}

#[async_trait]
impl IdentityResolver for EmployeeResolver {
    async fn resolve(
        &self,
        profile: &ValidatedProfile,
        federation: Option<&FederationSessionClaims>,
    ) -> Result<SessionUser, ResolveError> {
        let issuer = federation.map_or("", |f| f.issuer.as_str());
        let employee = EmployeeProfile::from_validated(profile, &self.external_id_prefix, issuer)
            .map_err(|e| ResolveError::Profile(e.to_string()))?;

        let user: EmployeeUser = self.client.post("/system/employee-login", &employee).await?;
        Ok(SessionUser::new(
            user.id,
            UserType::Employee,
            user.global_roles,
            user.all_scoped_roles,
        )?)
    }
}
