//! Server configuration.
//!
//! Configuration is read from a [`ConfigSource`]: the process environment
//! in production (seeded from `.env` by the binary), a map in tests. Every
//! problem is reported here, before the listener is bound.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fib_core::{ConfigSource, Error, ProcessEnv, Result};
use fib_crypto::RsaAlgorithm;
use fib_saml::constants::name_id_formats;
use fib_saml::{CertificateRef, TrustSettings};
use url::Url;

/// Kind of integration behind an identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationKind {
    /// Citizens through the national identity provider.
    Citizen,
    /// Employees through the organisation directory.
    Employee,
}

impl FromStr for IntegrationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "employee" => Ok(Self::Employee),
            other => Err(format!("unknown integration kind {other:?}")),
        }
    }
}

/// Configuration of one identity provider integration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Lowercase name used in routes (`/auth/{name}/…`).
    pub name: String,
    /// Integration kind.
    pub kind: IntegrationKind,
    /// Identity provider SSO URL.
    pub entry_point: String,
    /// Identity provider single logout URL.
    pub logout_url: Option<String>,
    /// Unresolved trust settings.
    pub trust: TrustSettings,
    /// Prefix for employee external ids.
    pub external_id_prefix: Option<String>,
    /// Path to land on after login when RelayState is unusable.
    pub default_redirect: String,
    /// Path to land on after a failed login.
    pub error_redirect: String,
}

impl ProviderConfig {
    fn from_source(src: &impl ConfigSource, name: &str) -> Result<Self> {
        let key = |suffix: &str| format!("FIB_{}_{suffix}", name.to_ascii_uppercase());

        let kind: IntegrationKind = src
            .required(&key("KIND"))?
            .parse()
            .map_err(|e| Error::Config(format!("{}: {e}", key("KIND"))))?;

        let idp_certificates = src
            .list(&key("PUBLIC_CERT"))
            .iter()
            .map(|r| CertificateRef::parse(r))
            .collect();

        let mut trust = TrustSettings::new(
            src.required(&key("ISSUER"))?,
            src.required(&key("IDP_ISSUER"))?,
            idp_certificates,
            CertificateRef::parse(&src.required(&key("PRIVATE_CERT"))?),
        );
        trust.own_certificate = src.optional(&key("OWN_CERT")).map(|r| CertificateRef::parse(&r));
        trust.signature_algorithm =
            src.parse_or(&key("SIGNATURE_ALGORITHM"), RsaAlgorithm::default())?;
        trust.accepted_clock_skew = src.millis_or(&key("ACCEPTED_CLOCK_SKEW_MS"), Duration::ZERO)?;
        trust.decrypt_assertions = src.flag(&key("DECRYPT_ASSERTIONS"), false)?;
        trust.name_id_format = src
            .optional(&key("NAME_ID_FORMAT"))
            .unwrap_or_else(|| name_id_formats::TRANSIENT.to_string());
        trust.disable_requested_authn_context =
            src.flag(&key("DISABLE_REQUESTED_AUTHN_CONTEXT"), false)?;
        trust.want_authn_response_signed = src.flag(&key("WANT_AUTHN_RESPONSE_SIGNED"), false)?;
        trust.validate_in_response_to = src.flag(&key("VALIDATE_IN_RESPONSE_TO"), true)?;

        let external_id_prefix = match kind {
            IntegrationKind::Employee => Some(src.required(&key("EXTERNAL_ID_PREFIX"))?),
            IntegrationKind::Citizen => src.optional(&key("EXTERNAL_ID_PREFIX")),
        };

        Ok(Self {
            name: name.to_ascii_lowercase(),
            kind,
            entry_point: src.required(&key("ENTRY_POINT"))?,
            logout_url: src.optional(&key("LOGOUT_URL")),
            trust,
            external_id_prefix,
            default_redirect: src.optional(&key("DEFAULT_REDIRECT")).unwrap_or_else(|| "/".into()),
            error_redirect: src.optional(&key("ERROR_REDIRECT")).unwrap_or_else(|| "/".into()),
        })
    }
}

/// Default lifetime of an established session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(8 * 60 * 60);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Application base origin. Redirect targets must stay on it.
    pub base_url: Url,
    /// Remote identity service.
    pub identity_service_url: Url,
    /// Timeout for identity service calls.
    pub identity_service_timeout: Duration,
    /// Lifetime of an established session.
    pub session_ttl: Duration,
    /// Whether the dev/test login routes exist.
    pub dev_login_enabled: bool,
    /// Directory of well-known certificates.
    pub certificate_dir: Option<PathBuf>,
    /// Configured identity providers.
    pub providers: Vec<ProviderConfig>,
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing or malformed values.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Loads configuration from `src`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing or malformed values.
    pub fn from_source(src: &impl ConfigSource) -> Result<Self> {
        let host = src.optional("FIB_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = src.parse_or("FIB_PORT", 8080u16)?;

        let base_url = parse_url(src, "FIB_BASE_URL")?;
        if base_url.cannot_be_a_base() || !base_url.origin().is_tuple() {
            return Err(Error::Config("FIB_BASE_URL must be an http(s) origin".into()));
        }

        let identity_service_url = parse_url(src, "FIB_IDENTITY_SERVICE_URL")?;
        let identity_service_timeout =
            src.millis_or("FIB_IDENTITY_SERVICE_TIMEOUT_MS", Duration::from_secs(10))?;
        let session_ttl = src.millis_or("FIB_SESSION_TTL_MS", DEFAULT_SESSION_TTL)?;
        if session_ttl.is_zero() {
            return Err(Error::Config("FIB_SESSION_TTL_MS must be positive".into()));
        }

        let providers = src
            .list("FIB_PROVIDERS")
            .iter()
            .map(|name| ProviderConfig::from_source(src, name))
            .collect::<Result<Vec<_>>>()?;
        if providers.is_empty() {
            return Err(Error::Config("FIB_PROVIDERS lists no identity providers".into()));
        }

        Ok(Self {
            host,
            port,
            base_url,
            identity_service_url,
            identity_service_timeout,
            session_ttl,
            dev_login_enabled: src.flag("FIB_DEV_LOGIN_ENABLED", false)?,
            certificate_dir: src.optional("FIB_CERTIFICATE_DIR").map(PathBuf::from),
            providers,
        })
    }

    /// Whether the session cookie may be sent over plain http.
    #[must_use]
    pub fn insecure_cookies(&self) -> bool {
        self.base_url.scheme() == "http"
    }
}

fn parse_url(src: &impl ConfigSource, key: &str) -> Result<Url> {
    let raw = src.required(key)?;
    Url::parse(&raw).map_err(|e| Error::Config(format!("{key} is not a URL: {e}")))
}
