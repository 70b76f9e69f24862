//! Per identity provider trust configuration.
//!
//! [`TrustSettings`] is what configuration says: certificate references that
//! may point at files, well-known aliases or inline PEM. [`TrustResolver`]
//! turns settings into a [`TrustDescriptor`] that holds only loaded PEM
//! contents. All disk access happens inside [`TrustResolver::build`] and
//! [`WellKnownCertificates::load_dir`], both of which run at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fib_crypto::RsaAlgorithm;
use thiserror::Error;

use crate::constants::name_id_formats;

/// Errors raised while resolving trust configuration. All are fatal.
#[derive(Debug, Error)]
pub enum TrustError {
    /// No verification certificate was configured.
    #[error("at least one identity provider certificate is required")]
    NoCertificates,

    /// A certificate alias is not in the registry.
    #[error("unknown certificate alias {0:?}")]
    UnknownAlias(String),

    /// Aliases can only name public certificates.
    #[error("{0} cannot be given as a certificate alias")]
    AliasNotAllowed(&'static str),

    /// A referenced file could not be read.
    #[error("cannot read {path}: {source}")]
    FileRead {
        /// Referenced path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Content is not PEM of the expected kind.
    #[error("{what} is not valid PEM: {reason}")]
    InvalidPem {
        /// What was being loaded.
        what: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<TrustError> for fib_core::Error {
    fn from(err: TrustError) -> Self {
        match err {
            TrustError::FileRead { path, source } => Self::FileRead {
                path,
                reason: source.to_string(),
            },
            other => Self::Config(other.to_string()),
        }
    }
}

/// A reference to PEM material as written in configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum CertificateRef {
    /// Name of a certificate in the [`WellKnownCertificates`] registry.
    Alias(String),
    /// Path to a PEM file.
    Path(PathBuf),
    /// PEM content given directly.
    InlinePem(String),
}

impl CertificateRef {
    /// Interprets a configuration value.
    ///
    /// Values containing PEM armor are inline PEM. Values that look like a
    /// path (a separator or a `.pem`/`.crt`/`.cer`/`.key` extension) are
    /// paths. Anything else is an alias.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains("-----BEGIN ") {
            return Self::InlinePem(raw.to_string());
        }
        let path = Path::new(raw);
        let has_pem_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e, "pem" | "crt" | "cer" | "key"));
        if raw.contains('/') || raw.contains('\\') || has_pem_extension {
            Self::Path(path.to_path_buf())
        } else {
            Self::Alias(raw.to_string())
        }
    }
}

// Inline PEM is key material for private keys; keep it out of logs.
impl fmt::Debug for CertificateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alias(a) => f.debug_tuple("Alias").field(a).finish(),
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::InlinePem(_) => f.write_str("InlinePem(..)"),
        }
    }
}

/// Registry of named identity provider certificates.
///
/// Constructed once at startup and passed to [`TrustResolver::new`].
#[derive(Debug, Clone, Default)]
pub struct WellKnownCertificates {
    certs: BTreeMap<String, String>,
}

impl WellKnownCertificates {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a certificate under `alias`.
    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, pem: impl Into<String>) -> Self {
        self.certs.insert(alias.into(), pem.into());
        self
    }

    /// Loads every `*.pem`/`*.crt` file in `dir`, keyed by file stem.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or one of its certificate files
    /// cannot be read, or a file is not PEM.
    pub fn load_dir(dir: &Path) -> Result<Self, TrustError> {
        let read_err = |path: &Path, source| TrustError::FileRead {
            path: path.display().to_string(),
            source,
        };

        let mut registry = Self::new();
        let entries = std::fs::read_dir(dir).map_err(|e| read_err(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| read_err(dir, e))?.path();
            let is_cert = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "pem" | "crt"));
            let Some(alias) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_cert {
                continue;
            }
            let pem = std::fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
            check_certificate(&pem, &format!("certificate {alias:?}"))?;
            tracing::debug!(alias, path = %path.display(), "loaded well-known certificate");
            registry.certs.insert(alias.to_string(), pem);
        }
        Ok(registry)
    }

    /// Returns the PEM registered under `alias`.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.certs.get(alias).map(String::as_str)
    }

    /// Returns all registered aliases.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.certs.keys().map(String::as_str)
    }
}

/// Trust configuration as read from the environment.
#[derive(Debug, Clone)]
pub struct TrustSettings {
    /// Our entity id.
    pub sp_entity_id: String,
    /// The issuer the identity provider must assert.
    pub idp_issuer: String,
    /// Identity provider verification certificates.
    pub idp_certificates: Vec<CertificateRef>,
    /// Our signing (and decryption) private key.
    pub private_key: CertificateRef,
    /// Our public certificate, published in metadata.
    pub own_certificate: Option<CertificateRef>,
    /// Whether assertions arrive encrypted.
    pub decrypt_assertions: bool,
    /// Tolerated clock difference.
    pub accepted_clock_skew: Duration,
    /// Algorithm for outgoing signatures.
    pub signature_algorithm: RsaAlgorithm,
    /// Requested NameID format.
    pub name_id_format: String,
    /// Omit `RequestedAuthnContext` from outgoing requests.
    pub disable_requested_authn_context: bool,
    /// Require a signature on the Response element too.
    pub want_authn_response_signed: bool,
    /// Require `InResponseTo` to match an outstanding request.
    pub validate_in_response_to: bool,
}

impl TrustSettings {
    /// Creates settings with defaults for everything but identities and keys.
    #[must_use]
    pub fn new(
        sp_entity_id: impl Into<String>,
        idp_issuer: impl Into<String>,
        idp_certificates: Vec<CertificateRef>,
        private_key: CertificateRef,
    ) -> Self {
        Self {
            sp_entity_id: sp_entity_id.into(),
            idp_issuer: idp_issuer.into(),
            idp_certificates,
            private_key,
            own_certificate: None,
            decrypt_assertions: false,
            accepted_clock_skew: Duration::ZERO,
            signature_algorithm: RsaAlgorithm::RsaSha256,
            name_id_format: name_id_formats::TRANSIENT.to_string(),
            disable_requested_authn_context: false,
            want_authn_response_signed: false,
            validate_in_response_to: true,
        }
    }
}

/// Resolved, immutable trust configuration for one identity provider.
#[derive(Clone)]
pub struct TrustDescriptor {
    sp_entity_id: String,
    idp_issuer: String,
    idp_certificates: Vec<String>,
    private_key_pem: String,
    own_certificate_pem: Option<String>,
    decrypt_assertions: bool,
    accepted_clock_skew: Duration,
    signature_algorithm: RsaAlgorithm,
    name_id_format: String,
    disable_requested_authn_context: bool,
    want_authn_response_signed: bool,
    validate_in_response_to: bool,
}

impl TrustDescriptor {
    /// Our entity id.
    #[must_use]
    pub fn sp_entity_id(&self) -> &str {
        &self.sp_entity_id
    }

    /// Expected identity provider issuer.
    #[must_use]
    pub fn idp_issuer(&self) -> &str {
        &self.idp_issuer
    }

    /// Identity provider verification certificates (PEM). Never empty.
    #[must_use]
    pub fn idp_certificates(&self) -> &[String] {
        &self.idp_certificates
    }

    /// Our private key (PEM).
    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Our public certificate (PEM), if configured.
    #[must_use]
    pub fn own_certificate_pem(&self) -> Option<&str> {
        self.own_certificate_pem.as_deref()
    }

    /// Whether assertions must arrive encrypted.
    #[must_use]
    pub const fn decrypt_assertions(&self) -> bool {
        self.decrypt_assertions
    }

    /// Tolerated clock difference.
    #[must_use]
    pub const fn accepted_clock_skew(&self) -> Duration {
        self.accepted_clock_skew
    }

    /// Algorithm for outgoing signatures.
    #[must_use]
    pub const fn signature_algorithm(&self) -> RsaAlgorithm {
        self.signature_algorithm
    }

    /// Requested NameID format.
    #[must_use]
    pub fn name_id_format(&self) -> &str {
        &self.name_id_format
    }

    /// Whether `RequestedAuthnContext` is omitted.
    #[must_use]
    pub const fn disable_requested_authn_context(&self) -> bool {
        self.disable_requested_authn_context
    }

    /// Whether the Response element must be signed.
    #[must_use]
    pub const fn want_authn_response_signed(&self) -> bool {
        self.want_authn_response_signed
    }

    /// Whether `InResponseTo` is checked.
    #[must_use]
    pub const fn validate_in_response_to(&self) -> bool {
        self.validate_in_response_to
    }
}

impl fmt::Debug for TrustDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustDescriptor")
            .field("sp_entity_id", &self.sp_entity_id)
            .field("idp_issuer", &self.idp_issuer)
            .field("idp_certificates", &self.idp_certificates.len())
            .field("decrypt_assertions", &self.decrypt_assertions)
            .field("accepted_clock_skew", &self.accepted_clock_skew)
            .field("signature_algorithm", &self.signature_algorithm)
            .finish_non_exhaustive()
    }
}

/// Builds [`TrustDescriptor`]s against a certificate registry.
#[derive(Debug, Clone, Copy)]
pub struct TrustResolver<'a> {
    registry: &'a WellKnownCertificates,
}

impl<'a> TrustResolver<'a> {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub const fn new(registry: &'a WellKnownCertificates) -> Self {
        Self { registry }
    }

    /// Loads all referenced material and returns the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty certificate list, unknown aliases,
    /// unreadable files, certificates that do not parse as X.509, or a
    /// private key that is not a usable RSA key.
    pub fn build(&self, settings: &TrustSettings) -> Result<TrustDescriptor, TrustError> {
        if settings.idp_certificates.is_empty() {
            return Err(TrustError::NoCertificates);
        }

        let idp_certificates = settings
            .idp_certificates
            .iter()
            .map(|r| self.load_certificate(r))
            .collect::<Result<Vec<_>, _>>()?;

        let private_key_pem = load_local(&settings.private_key, "private key")?;
        check_private_key(&private_key_pem)?;

        let own_certificate_pem = settings
            .own_certificate
            .as_ref()
            .map(|r| {
                let pem = load_local(r, "own certificate")?;
                check_certificate(&pem, "own certificate")?;
                Ok::<_, TrustError>(pem)
            })
            .transpose()?;

        Ok(TrustDescriptor {
            sp_entity_id: settings.sp_entity_id.clone(),
            idp_issuer: settings.idp_issuer.clone(),
            idp_certificates,
            private_key_pem,
            own_certificate_pem,
            decrypt_assertions: settings.decrypt_assertions,
            accepted_clock_skew: settings.accepted_clock_skew,
            signature_algorithm: settings.signature_algorithm,
            name_id_format: settings.name_id_format.clone(),
            disable_requested_authn_context: settings.disable_requested_authn_context,
            want_authn_response_signed: settings.want_authn_response_signed,
            validate_in_response_to: settings.validate_in_response_to,
        })
    }

    fn load_certificate(&self, reference: &CertificateRef) -> Result<String, TrustError> {
        let pem = match reference {
            CertificateRef::Alias(alias) => self
                .registry
                .get(alias)
                .map(String::from)
                .ok_or_else(|| TrustError::UnknownAlias(alias.clone()))?,
            other => load_local(other, "identity provider certificate")?,
        };
        check_certificate(&pem, "identity provider certificate")?;
        Ok(pem)
    }
}

fn load_local(reference: &CertificateRef, what: &'static str) -> Result<String, TrustError> {
    match reference {
        CertificateRef::Alias(_) => Err(TrustError::AliasNotAllowed(what)),
        CertificateRef::InlinePem(pem) => Ok(pem.clone()),
        CertificateRef::Path(path) => {
            std::fs::read_to_string(path).map_err(|source| TrustError::FileRead {
                path: path.display().to_string(),
                source,
            })
        }
    }
}

/// The certificate must be PEM armored X.509 with an extractable key.
fn check_certificate(pem: &str, what: &str) -> Result<(), TrustError> {
    fib_crypto::pem_to_der(pem, "CERTIFICATE")
        .and_then(|der| fib_crypto::certificate_public_key(&der))
        .map(|_| ())
        .map_err(|e| TrustError::InvalidPem {
            what: what.to_string(),
            reason: e.to_string(),
        })
}

fn check_private_key(pem: &str) -> Result<(), TrustError> {
    fib_crypto::private_key_der(pem)
        .and_then(|der| fib_crypto::validate_rsa_private_key(&der))
        .map_err(|e| TrustError::InvalidPem {
            what: "private key".to_string(),
            reason: e.to_string(),
        })
}
