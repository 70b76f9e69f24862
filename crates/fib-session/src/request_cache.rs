//! Outstanding AuthnRequest ids.
//!
//! Each id is accepted once as `InResponseTo` within the TTL. The cache
//! holds a bounded number of ids; when full, the oldest is dropped.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default lifetime of an outstanding request.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(10 * 60);

/// Default number of outstanding requests tracked at once.
pub const DEFAULT_MAX_REQUESTS: usize = 100_000;

/// Cache of AuthnRequest ids awaiting a response.
#[derive(Debug)]
pub struct AuthnRequestCache {
    entries: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for AuthnRequestCache {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TTL)
    }
}

impl AuthnRequestCache {
    /// Creates a cache with the given entry lifetime.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, DEFAULT_MAX_REQUESTS)
    }

    /// Creates a cache that tracks at most `max_entries` ids.
    #[must_use]
    pub fn with_limit(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Records an outstanding request id, evicting the oldest when full.
    pub fn insert(&self, request_id: impl Into<String>) {
        let now = Instant::now();
        let request_id = request_id.into();
        let mut entries = self.entries.lock();
        entries.retain(|_, expires| *expires > now);
        while entries.len() >= self.max_entries && !entries.contains_key(&request_id) {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, expires)| **expires)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            tracing::debug!(request_id = %oldest, "request cache full, evicting oldest");
            entries.remove(&oldest);
        }
        entries.insert(request_id, now + self.ttl);
    }

    /// Removes `request_id` and returns whether it was outstanding and
    /// unexpired.
    pub fn consume(&self, request_id: &str) -> bool {
        self.entries
            .lock()
            .remove(request_id)
            .is_some_and(|expires| expires > Instant::now())
    }

    /// Number of tracked ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when no id is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
