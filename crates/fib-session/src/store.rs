//! Session storage.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{SessionError, SessionResult};
use crate::session::EstablishedSession;

/// Storage for established sessions.
///
/// `login` is the only way a session comes into existence and commits the
/// whole session in one call. Implementations may be in-memory or backed by
/// a shared cache.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Commits a new session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Conflict`] if the id is taken, or a storage
    /// error.
    async fn login(&self, session: EstablishedSession) -> SessionResult<()>;

    /// Looks up a live session.
    async fn get(&self, session_id: &str) -> SessionResult<Option<EstablishedSession>>;

    /// Removes a session and returns it if it was live.
    async fn logout(&self, session_id: &str) -> SessionResult<Option<EstablishedSession>>;
}

/// In-process session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, EstablishedSession>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    /// Creates a store whose sessions never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose sessions expire `ttl` after creation.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// Number of stored sessions, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &EstablishedSession) -> bool {
        self.ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .is_some_and(|ttl| session.created_at + ttl <= Utc::now())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn login(&self, session: EstablishedSession) -> SessionResult<()> {
        if self.ttl.is_some() {
            self.sessions.retain(|_, stored| !self.is_expired(stored));
        }
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(SessionError::Conflict),
            Entry::Vacant(slot) => {
                tracing::debug!(user_id = %session.user.id(), "session established");
                slot.insert(session);
                Ok(())
            }
        }
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<EstablishedSession>> {
        let found = self.sessions.get(session_id).map(|s| s.value().clone());
        match found {
            Some(session) if self.is_expired(&session) => {
                self.sessions.remove(session_id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn logout(&self, session_id: &str) -> SessionResult<Option<EstablishedSession>> {
        Ok(self
            .sessions
            .remove(session_id)
            .map(|(_, session)| session)
            .filter(|session| !self.is_expired(session)))
    }
}
