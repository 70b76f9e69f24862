//! The login pipeline.
//!
//! ```text
//! Received -> AssertionValidated -> ProfileValidated -> ClaimsSplit
//!          -> IdentityResolved -> SessionEstablished -> Redirected
//! ```
//!
//! Any stage may fail into [`LoginFailure`], which the endpoint turns into
//! a redirect to the integration's error path. The session is committed in
//! one [`SessionStore::login`](fib_session::SessionStore::login) call after
//! claims, profile and user all exist.

use std::fmt;

use fib_core::{AuthEvent, EventType};
use fib_saml::claims::keys;
use fib_saml::{
    resolve_redirect, split_claims, ClaimsError, ProfileValidationError, RawProfile, SamlError,
    ValidationContext,
};
use fib_session::{EstablishedSession, LoginErrorCode, ResolveError, SessionError};
use thiserror::Error;
use url::Url;

use crate::integrations::Integration;
use crate::state::AppState;

/// Stages of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    /// The callback arrived.
    Received,
    /// The assertion was verified and flattened.
    AssertionValidated,
    /// Business attributes passed the schema.
    ProfileValidated,
    /// Federation claims were split off.
    ClaimsSplit,
    /// The identity service returned a user.
    IdentityResolved,
    /// The session was committed.
    SessionEstablished,
    /// The browser was sent on.
    Redirected,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a login attempt failed.
#[derive(Debug, Error)]
pub enum LoginFailure {
    /// The SAML message was rejected.
    #[error(transparent)]
    Protocol(#[from] SamlError),

    /// Mandatory federation claims were missing.
    #[error(transparent)]
    Claims(#[from] ClaimsError),

    /// Business attributes did not satisfy the schema.
    #[error(transparent)]
    Profile(#[from] ProfileValidationError),

    /// The identity service did not produce a user.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The session could not be committed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl LoginFailure {
    /// The last stage reached before the failure.
    #[must_use]
    pub const fn stage(&self) -> LoginStage {
        match self {
            Self::Protocol(_) => LoginStage::Received,
            Self::Profile(_) => LoginStage::AssertionValidated,
            Self::Claims(_) => LoginStage::ProfileValidated,
            Self::Resolve(_) => LoginStage::ClaimsSplit,
            Self::Session(_) => LoginStage::IdentityResolved,
        }
    }

    /// The code to pass on to the error page, if any.
    #[must_use]
    pub const fn error_code(&self) -> Option<LoginErrorCode> {
        match self {
            Self::Resolve(e) => e.error_code(),
            _ => None,
        }
    }
}

/// A completed login.
#[derive(Debug)]
pub struct LoginOutcome {
    /// The committed session.
    pub session: EstablishedSession,
    /// Where to send the browser.
    pub redirect: Url,
}

/// Validates a posted `SAMLResponse` and checks `InResponseTo`.
///
/// # Errors
///
/// Returns [`LoginFailure::Protocol`] for any protocol problem.
pub fn validate_assertion(
    state: &AppState,
    integration: &Integration,
    saml_response: &str,
) -> Result<RawProfile, LoginFailure> {
    let ctx = ValidationContext::now().with_acs_url(integration.acs_url(&state.config.base_url));
    let raw = state
        .validator
        .validate(&integration.trust, saml_response, &ctx)?;

    if integration.trust.validate_in_response_to() {
        let in_response_to = raw
            .get(keys::IN_RESPONSE_TO)
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if in_response_to.is_empty() || !state.requests.consume(in_response_to) {
            return Err(SamlError::UnexpectedInResponseTo(in_response_to.to_string()).into());
        }
    }

    tracing::debug!(provider = %integration.name, stage = %LoginStage::AssertionValidated, "assertion accepted");
    Ok(raw)
}

/// What the assertion said about who was logging in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginSubject {
    /// Asserting issuer.
    pub issuer: Option<String>,
    /// Asserted NameID.
    pub name_id: Option<String>,
}

impl LoginSubject {
    /// Reads the subject from a flattened assertion.
    #[must_use]
    pub fn of(raw: &RawProfile) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            issuer: text(keys::ISSUER),
            name_id: text(keys::NAME_ID),
        }
    }
}

/// A failed login together with the subject it was attempted for.
#[derive(Debug)]
pub struct LoginRejection {
    /// Why the login failed.
    pub failure: LoginFailure,
    /// The subject, when the assertion got far enough to name one.
    pub subject: LoginSubject,
}

impl From<LoginFailure> for LoginRejection {
    fn from(failure: LoginFailure) -> Self {
        Self {
            failure,
            subject: LoginSubject::default(),
        }
    }
}

/// Runs the pipeline from profile validation onward.
///
/// Shared by the SAML callback and the dev login.
///
/// # Errors
///
/// Returns the first failure along with the asserted subject. Profile
/// errors take precedence over claim errors; both checks always run.
pub async fn complete_login(
    state: &AppState,
    integration: &Integration,
    raw: RawProfile,
    relay_state: Option<&str>,
) -> Result<LoginOutcome, LoginRejection> {
    let subject = LoginSubject::of(&raw);
    establish(state, integration, raw, relay_state)
        .await
        .map_err(|failure| LoginRejection { failure, subject })
}

async fn establish(
    state: &AppState,
    integration: &Integration,
    raw: RawProfile,
    relay_state: Option<&str>,
) -> Result<LoginOutcome, LoginFailure> {
    let issuer = raw
        .get(keys::ISSUER)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let profile = integration.schema.validate(&raw, &issuer);
    let claims = split_claims(raw);
    let profile = profile?;
    let (claims, _attributes) = claims?;
    tracing::debug!(provider = %integration.name, stage = %LoginStage::ClaimsSplit, "profile accepted");

    let business = integration.business_profile(&profile, &claims)?;
    let user = integration.resolver.resolve(&profile, Some(&claims)).await?;
    tracing::debug!(provider = %integration.name, stage = %LoginStage::IdentityResolved, user_id = %user.id(), "identity resolved");

    let session = EstablishedSession::new(user, integration.auth_type(), business, claims);
    state.sessions.login(session.clone()).await?;

    let base = &state.config.base_url;
    let redirect =
        resolve_redirect(relay_state, base).unwrap_or_else(|| integration.default_redirect(base));

    AuthEvent::builder(EventType::Login)
        .provider(&integration.name)
        .issuer(&issuer)
        .user(session.user.id())
        .session(&session.id)
        .emit();

    Ok(LoginOutcome { session, redirect })
}

/// The audit event recorded for a rejected login.
#[must_use]
pub fn login_error_event(integration: &Integration, rejection: &LoginRejection) -> AuthEvent {
    let failure = &rejection.failure;
    let mut event = AuthEvent::builder(EventType::LoginError)
        .failure(failure.to_string())
        .provider(&integration.name)
        .detail("stage", failure.stage().to_string());
    if let Some(issuer) = &rejection.subject.issuer {
        event = event.issuer(issuer);
    }
    if let Some(name_id) = &rejection.subject.name_id {
        event = event.detail("name_id", name_id);
    }
    event.build()
}

/// Records `rejection` and returns the error redirect for it.
#[must_use]
pub fn failure_redirect(
    state: &AppState,
    integration: &Integration,
    rejection: &LoginRejection,
) -> Url {
    login_error_event(integration, rejection).emit();
    error_redirect(
        &integration.error_redirect(&state.config.base_url),
        rejection.failure.error_code(),
    )
}

/// Appends `loginError=true` and, for recognised codes, `errorCode`.
#[must_use]
pub fn error_redirect(error_path: &Url, code: Option<LoginErrorCode>) -> Url {
    let mut url = error_path.clone();
    url.set_fragment(None);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("loginError", "true");
        if let Some(code) = code {
            query.append_pair("errorCode", code.as_str());
        }
    }
    url
}
