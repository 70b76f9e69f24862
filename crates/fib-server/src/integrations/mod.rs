//! Identity provider integrations.
//!
//! An [`Integration`] binds one identity provider's trust configuration to
//! a business schema, a profile builder and an identity resolver.

pub mod citizen;
pub mod employee;

use std::sync::Arc;

use fib_saml::{
    FederationSessionClaims, ProfileSchema, ProfileValidationError, TrustDescriptor,
    ValidatedProfile,
};
use fib_session::{AuthType, BusinessProfile, CitizenProfile, EmployeeProfile, IdentityResolver};
use url::Url;

use crate::config::{IntegrationKind, ProviderConfig};
use crate::identity_service::IdentityServiceClient;

pub use citizen::CitizenResolver;
pub use employee::EmployeeResolver;

/// A configured identity provider integration.
pub struct Integration {
    /// Route name.
    pub name: String,
    /// Integration kind.
    pub kind: IntegrationKind,
    /// Resolved trust.
    pub trust: Arc<TrustDescriptor>,
    /// Identity provider SSO URL.
    pub entry_point: String,
    /// Identity provider single logout URL.
    pub logout_url: Option<String>,
    /// Business schema applied to every raw profile.
    pub schema: ProfileSchema,
    /// User lookup.
    pub resolver: Arc<dyn IdentityResolver>,
    external_id_prefix: String,
    default_redirect: String,
    error_redirect: String,
}

impl Integration {
    /// Builds the integration for `config` with the remote resolver for
    /// its kind.
    #[must_use]
    pub fn new(config: &ProviderConfig, trust: TrustDescriptor, client: IdentityServiceClient) -> Self {
        let prefix = config.external_id_prefix.clone().unwrap_or_default();
        let resolver: Arc<dyn IdentityResolver> = match config.kind {
            IntegrationKind::Citizen => Arc::new(CitizenResolver::new(client)),
            IntegrationKind::Employee => Arc::new(EmployeeResolver::new(client, prefix.clone())),
        };
        Self::with_resolver(config, trust, resolver)
    }

    /// Builds the integration with a caller-supplied resolver.
    #[must_use]
    pub fn with_resolver(
        config: &ProviderConfig,
        trust: TrustDescriptor,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let schema = match config.kind {
            IntegrationKind::Citizen => citizen::schema(),
            IntegrationKind::Employee => employee::schema(),
        };
        Self {
            name: config.name.clone(),
            kind: config.kind,
            trust: Arc::new(trust),
            entry_point: config.entry_point.clone(),
            logout_url: config.logout_url.clone(),
            schema,
            resolver,
            external_id_prefix: config.external_id_prefix.clone().unwrap_or_default(),
            default_redirect: config.default_redirect.clone(),
            error_redirect: config.error_redirect.clone(),
        }
    }

    /// Session authentication type.
    #[must_use]
    pub const fn auth_type(&self) -> AuthType {
        match self.kind {
            IntegrationKind::Citizen => AuthType::Sfi,
            IntegrationKind::Employee => AuthType::Ad,
        }
    }

    /// Builds the business profile stored in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing.
    pub fn business_profile(
        &self,
        profile: &ValidatedProfile,
        claims: &FederationSessionClaims,
    ) -> Result<BusinessProfile, ProfileValidationError> {
        Ok(match self.kind {
            IntegrationKind::Citizen => {
                BusinessProfile::Citizen(CitizenProfile::from_validated(profile, &claims.issuer)?)
            }
            IntegrationKind::Employee => BusinessProfile::Employee(EmployeeProfile::from_validated(
                profile,
                &self.external_id_prefix,
                &claims.issuer,
            )?),
        })
    }

    /// Where to land after login when RelayState is unusable.
    #[must_use]
    pub fn default_redirect(&self, base: &Url) -> Url {
        base.join(&self.default_redirect).unwrap_or_else(|_| base.clone())
    }

    /// Base of the error redirect, before query parameters.
    #[must_use]
    pub fn error_redirect(&self, base: &Url) -> Url {
        base.join(&self.error_redirect).unwrap_or_else(|_| base.clone())
    }

    /// Assertion consumer service URL.
    #[must_use]
    pub fn acs_url(&self, base: &Url) -> String {
        self.route_url(base, "login/callback")
    }

    /// Single logout callback URL.
    #[must_use]
    pub fn slo_url(&self, base: &Url) -> String {
        self.route_url(base, "logout/callback")
    }

    fn route_url(&self, base: &Url, suffix: &str) -> String {
        format!(
            "{}/auth/{}/{suffix}",
            base.as_str().trim_end_matches('/'),
            self.name
        )
    }
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("trust", &self.trust)
            .finish_non_exhaustive()
    }
}
