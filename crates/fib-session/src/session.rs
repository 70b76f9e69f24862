//! Established application sessions.

use chrono::{DateTime, Utc};
use fib_saml::FederationSessionClaims;
use serde::{Deserialize, Serialize};

use crate::profile::{AuthType, BusinessProfile};
use crate::user::SessionUser;

/// A fully established application session.
///
/// Every part is required at construction, so a session can only be
/// committed once claims, profile and user all exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstablishedSession {
    /// Opaque session id, also the cookie value. The bare `id` key belongs
    /// to the user.
    #[serde(rename = "sessionId")]
    pub id: String,
    /// The resolved user, flattened into the session object.
    #[serde(flatten)]
    pub user: SessionUser,
    /// How the session was authenticated.
    pub auth_type: AuthType,
    /// Business attributes.
    pub profile: BusinessProfile,
    /// Federation claims needed for single logout.
    pub saml_session: FederationSessionClaims,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl EstablishedSession {
    /// Creates a session with a fresh id.
    #[must_use]
    pub fn new(
        user: SessionUser,
        auth_type: AuthType,
        profile: BusinessProfile,
        saml_session: FederationSessionClaims,
    ) -> Self {
        Self {
            id: fib_crypto::generate_session_id(),
            user,
            auth_type,
            profile,
            saml_session,
            created_at: Utc::now(),
        }
    }
}
