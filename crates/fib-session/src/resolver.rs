//! Identity resolution.
//!
//! An [`IdentityResolver`] maps a validated profile to an application user,
//! usually by calling a remote identity service. The login flow calls it at
//! most once per authentication event and aborts on any error.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use fib_saml::{FederationSessionClaims, ValidatedProfile};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SessionError;
use crate::user::SessionUser;

/// Error codes that may be shown to the user after a failed login.
///
/// Anything the identity service reports outside this set is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoginErrorCode {
    /// The account exists but is disabled.
    AccountDisabled,
    /// The identity matches more than one account.
    IdentityConflict,
    /// Logins are blocked for this identity.
    LoginBlocked,
}

impl LoginErrorCode {
    /// Every recognised code.
    pub const ALL: [Self; 3] = [Self::AccountDisabled, Self::IdentityConflict, Self::LoginBlocked];

    /// The wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountDisabled => "account-disabled",
            Self::IdentityConflict => "identity-conflict",
            Self::LoginBlocked => "login-blocked",
        }
    }
}

impl fmt::Display for LoginErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unrecognised login error code: {s}"))
    }
}

/// Identity resolution failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The identity service refused the login.
    #[error("login rejected by identity service")]
    Rejected {
        /// Recognised reason, if the service gave one.
        code: Option<LoginErrorCode>,
    },

    /// The validated profile cannot be sent as-is.
    #[error("profile not usable for resolution: {0}")]
    Profile(String),

    /// Transport failure, including timeouts.
    #[error("identity service unreachable: {0}")]
    Transport(String),

    /// The service answered with an unexpected status.
    #[error("identity service returned status {0}")]
    UnexpectedStatus(u16),

    /// The service answer could not be read.
    #[error("invalid identity service response: {0}")]
    InvalidResponse(String),

    /// The service returned a user that violates session invariants.
    #[error(transparent)]
    InvalidUser(#[from] SessionError),
}

impl ResolveError {
    /// The code to surface to the user, if any.
    #[must_use]
    pub const fn error_code(&self) -> Option<LoginErrorCode> {
        match self {
            Self::Rejected { code } => *code,
            _ => None,
        }
    }
}

/// Resolves an application user from a validated profile.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Looks up or provisions the user.
    ///
    /// # Errors
    ///
    /// Any error aborts the login.
    async fn resolve(
        &self,
        profile: &ValidatedProfile,
        federation: Option<&FederationSessionClaims>,
    ) -> Result<SessionUser, ResolveError>;
}
