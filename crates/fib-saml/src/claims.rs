//! Federation session claims.
//!
//! The identity provider's view of the login (issuer, NameID and session
//! index) is kept separately from business attributes. It is stored in
//! the application session and is what single logout needs to address the
//! right session at the identity provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validator::RawProfile;

/// Keys of the federation entries in a [`RawProfile`].
pub mod keys {
    /// Asserting issuer.
    pub const ISSUER: &str = "issuer";
    /// Subject NameID value.
    pub const NAME_ID: &str = "nameID";
    /// NameID format URI.
    pub const NAME_ID_FORMAT: &str = "nameIDFormat";
    /// Identity provider session index.
    pub const SESSION_INDEX: &str = "sessionIndex";
    /// NameID name qualifier.
    pub const NAME_QUALIFIER: &str = "nameQualifier";
    /// NameID SP name qualifier.
    pub const SP_NAME_QUALIFIER: &str = "spNameQualifier";
    /// Request the response answered.
    pub const IN_RESPONSE_TO: &str = "inResponseTo";

    /// Every federation key, removed from the business bag by
    /// [`super::split_claims`].
    pub const ALL: [&str; 7] = [
        ISSUER,
        NAME_ID,
        NAME_ID_FORMAT,
        SESSION_INDEX,
        NAME_QUALIFIER,
        SP_NAME_QUALIFIER,
        IN_RESPONSE_TO,
    ];
}

/// Missing mandatory federation claim. A protocol error, distinct from
/// business-schema failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimsError {
    /// A mandatory claim is absent or blank.
    #[error("federation claim {0} is missing")]
    Missing(&'static str),
}

/// Federation session claims, as persisted in the application session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationSessionClaims {
    /// Asserting issuer.
    pub issuer: String,
    /// Subject NameID.
    #[serde(rename = "nameID")]
    pub name_id: String,
    /// NameID format.
    #[serde(rename = "nameIDFormat")]
    pub name_id_format: String,
    /// Identity provider session index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,
    /// NameID name qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
    /// NameID SP name qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

fn take_string(bag: &mut RawProfile, key: &str) -> Option<String> {
    bag.remove(key)
        .and_then(|v| v.as_str().map(str::trim).map(String::from))
        .filter(|s| !s.is_empty())
}

/// Splits the federation claims off a raw profile.
///
/// Returns the claims and the remaining business attributes, which no
/// longer contain any federation key.
///
/// # Errors
///
/// Returns [`ClaimsError::Missing`] when `issuer`, `nameID` or
/// `nameIDFormat` is absent or blank.
pub fn split_claims(
    mut raw: RawProfile,
) -> Result<(FederationSessionClaims, RawProfile), ClaimsError> {
    let issuer = take_string(&mut raw, keys::ISSUER);
    let name_id = take_string(&mut raw, keys::NAME_ID);
    let name_id_format = take_string(&mut raw, keys::NAME_ID_FORMAT);
    let session_index = take_string(&mut raw, keys::SESSION_INDEX);
    let name_qualifier = take_string(&mut raw, keys::NAME_QUALIFIER);
    let sp_name_qualifier = take_string(&mut raw, keys::SP_NAME_QUALIFIER);
    raw.remove(keys::IN_RESPONSE_TO);

    let claims = FederationSessionClaims {
        issuer: issuer.ok_or(ClaimsError::Missing(keys::ISSUER))?,
        name_id: name_id.ok_or(ClaimsError::Missing(keys::NAME_ID))?,
        name_id_format: name_id_format.ok_or(ClaimsError::Missing(keys::NAME_ID_FORMAT))?,
        session_index,
        name_qualifier,
        sp_name_qualifier,
    };
    Ok((claims, raw))
}
