//! Session cookie.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

/// Cookie carrying the application session id.
pub const SESSION_COOKIE_NAME: &str = "fib.session";

/// `Set-Cookie` value for a new session.
#[must_use]
pub fn session_cookie(session_id: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly{secure_flag}; SameSite=Lax")
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly{secure_flag}; SameSite=Lax; Max-Age=0")
}

/// Appends a `Set-Cookie` header.
pub fn set_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(SET_COOKIE, value);
    }
}

/// Reads the session id from the request cookies.
#[must_use]
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|part| part.trim().strip_prefix(SESSION_COOKIE_NAME)?.strip_prefix('='))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}
