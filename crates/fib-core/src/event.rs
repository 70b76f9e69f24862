//! Security event logging.
//!
//! Authentication outcomes and rejected redirect targets are recorded as
//! structured events on the `fib::audit` tracing target, so deployments can
//! route them to a separate sink for abuse monitoring.
//!
//! Events carry identifiers (provider, issuer, internal user id, session id)
//! but never the attribute values asserted by an identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracing target used for every audit event.
pub const AUDIT_TARGET: &str = "fib::audit";

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A login completed and a session was established.
    Login,
    /// A login attempt failed.
    LoginError,
    /// A session was ended.
    Logout,
    /// Logout could not be completed against the identity provider.
    LogoutError,
    /// An untrusted redirect target was rejected.
    RedirectRejected,
}

impl EventType {
    /// Returns the stable name used in log output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::LoginError => "LOGIN_ERROR",
            Self::Logout => "LOGOUT",
            Self::LogoutError => "LOGOUT_ERROR",
            Self::RedirectRejected => "REDIRECT_REJECTED",
        }
    }
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A security event for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: EventType,
    /// Outcome of the event.
    pub outcome: EventOutcome,
    /// Identity provider integration the event belongs to.
    pub provider: Option<String>,
    /// Asserting issuer, when known.
    pub issuer: Option<String>,
    /// Internal user id, when resolved.
    pub user_id: Option<Uuid>,
    /// Application session id.
    pub session_id: Option<String>,
    /// Error message (for failure events).
    pub error: Option<String>,
    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl AuthEvent {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }

    /// Writes the event to the audit target.
    pub fn emit(&self) {
        let details = self
            .details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        match self.outcome {
            EventOutcome::Success => tracing::info!(
                target: AUDIT_TARGET,
                event_id = %self.id,
                event_type = self.event_type.as_str(),
                provider = self.provider.as_deref(),
                issuer = self.issuer.as_deref(),
                user_id = self.user_id.map(|id| id.to_string()),
                session_id = self.session_id.as_deref(),
                details = %details,
                "audit event"
            ),
            EventOutcome::Failure => tracing::warn!(
                target: AUDIT_TARGET,
                event_id = %self.id,
                event_type = self.event_type.as_str(),
                provider = self.provider.as_deref(),
                issuer = self.issuer.as_deref(),
                user_id = self.user_id.map(|id| id.to_string()),
                session_id = self.session_id.as_deref(),
                error = self.error.as_deref(),
                details = %details,
                "audit event"
            ),
        }
    }
}

/// Builder for creating events.
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    provider: Option<String>,
    issuer: Option<String>,
    user_id: Option<Uuid>,
    session_id: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            provider: None,
            issuer: None,
            user_id: None,
            session_id: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to success.
    #[must_use]
    pub const fn success(mut self) -> Self {
        self.outcome = EventOutcome::Success;
        self
    }

    /// Sets the outcome to failure with an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the asserting issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the user ID.
    #[must_use]
    pub const fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> AuthEvent {
        AuthEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            provider: self.provider,
            issuer: self.issuer,
            user_id: self.user_id,
            session_id: self.session_id,
            error: self.error,
            details: self.details,
        }
    }

    /// Builds and emits the event.
    pub fn emit(self) {
        self.build().emit();
    }
}
