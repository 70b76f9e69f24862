//! Post-login redirect target validation.
//!
//! RelayState round-trips through the identity provider and is never
//! trusted. A value is accepted only when, resolved against the
//! application base URL, it lands on exactly the same origin.

use fib_core::{AuthEvent, EventType};
use url::Url;

/// Longest prefix of a rejected value written to the audit log.
const LOGGED_VALUE_LIMIT: usize = 100;

/// Resolves `raw` against `base` and returns it when same-origin.
///
/// Absent or empty input yields `None` silently. Anything else that does
/// not resolve to the base origin (off-origin, malformed, another port or
/// scheme, opaque origins) yields `None` and a rejection event.
#[must_use]
pub fn resolve_redirect(raw: Option<&str>, base: &Url) -> Option<Url> {
    let raw = raw.filter(|r| !r.is_empty())?;

    match base.join(raw) {
        Ok(url) if url.origin().is_tuple() && url.origin() == base.origin() => Some(url),
        Ok(_) => {
            reject(raw, "off-origin target");
            None
        }
        Err(e) => {
            reject(raw, &format!("malformed target: {e}"));
            None
        }
    }
}

fn reject(raw: &str, reason: &str) {
    let shown: String = raw.chars().take(LOGGED_VALUE_LIMIT).collect();
    AuthEvent::builder(EventType::RedirectRejected)
        .failure(reason)
        .detail("relay_state", format!("{shown:?}"))
        .emit();
}
