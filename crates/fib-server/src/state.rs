//! Application state shared across all request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use fib_saml::{AssertionValidator, TrustResolver, WellKnownCertificates, XmlAssertionValidator};
use fib_session::{AuthnRequestCache, InMemorySessionStore, SessionStore};

use crate::config::ServerConfig;
use crate::identity_service::IdentityServiceClient;
use crate::integrations::Integration;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Integrations by route name.
    pub integrations: Arc<HashMap<String, Arc<Integration>>>,
    /// Session storage.
    pub sessions: Arc<dyn SessionStore>,
    /// Assertion validation.
    pub validator: Arc<dyn AssertionValidator>,
    /// Outstanding AuthnRequest ids.
    pub requests: Arc<AuthnRequestCache>,
}

impl AppState {
    /// Resolves trust for every configured provider and wires the default
    /// components.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable certificates or keys, or if the
    /// identity service client cannot be built.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let registry = match &config.certificate_dir {
            Some(dir) => WellKnownCertificates::load_dir(dir)?,
            None => WellKnownCertificates::new(),
        };
        let resolver = TrustResolver::new(&registry);
        let client = IdentityServiceClient::new(
            config.identity_service_url.clone(),
            config.identity_service_timeout,
        )?;

        let integrations = config
            .providers
            .iter()
            .map(|provider| {
                let trust = resolver.build(&provider.trust)?;
                tracing::info!(provider = %provider.name, kind = ?provider.kind, "identity provider configured");
                Ok(Integration::new(provider, trust, client.clone()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let sessions = Arc::new(InMemorySessionStore::with_ttl(config.session_ttl));
        Ok(Self::new(
            config,
            integrations,
            sessions,
            Arc::new(XmlAssertionValidator::new()),
        ))
    }

    /// Creates a state from explicit parts.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        integrations: Vec<Integration>,
        sessions: Arc<dyn SessionStore>,
        validator: Arc<dyn AssertionValidator>,
    ) -> Self {
        let integrations = integrations
            .into_iter()
            .map(|i| (i.name.clone(), Arc::new(i)))
            .collect();
        Self {
            config: Arc::new(config),
            integrations: Arc::new(integrations),
            sessions,
            validator,
            requests: Arc::new(AuthnRequestCache::default()),
        }
    }

    /// Replaces the session store.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Replaces the assertion validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn AssertionValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Looks up an integration by route name.
    #[must_use]
    pub fn integration(&self, name: &str) -> Option<Arc<Integration>> {
        self.integrations.get(name).cloned()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
