//! Cryptographically secure random identifiers.
//!
//! Used for application session ids and SAML message ids. All functions use
//! the thread-local generator from `rand`, which is a CSPRNG.

use std::fmt::Write;

use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Generates `len` random bytes.
#[must_use]
fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random string of `len` alphanumeric characters.
#[must_use]
fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates an application session identifier (32 alphanumeric chars,
/// roughly 190 bits of entropy).
#[must_use]
pub fn generate_session_id() -> String {
    random_alphanumeric(32)
}

/// Generates a SAML message ID.
///
/// XML IDs must not start with a digit, hence the leading underscore.
#[must_use]
pub fn generate_request_id() -> String {
    random_bytes(20)
        .iter()
        .fold(String::from("_"), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}
