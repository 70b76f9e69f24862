//! Business profiles carried by an application session.
//!
//! A profile is built from a [`ValidatedProfile`] whose field names follow
//! the constants in [`fields`]. Each integration's schema maps its own
//! attribute keys onto these names.

use fib_saml::{ProfileValidationError, ValidatedProfile};
use serde::{Deserialize, Serialize};

/// Field names shared by integration schemas and profile builders.
pub mod fields {
    /// National identification number.
    pub const SOCIAL_SECURITY_NUMBER: &str = "socialSecurityNumber";
    /// Given name.
    pub const FIRST_NAME: &str = "firstName";
    /// Family name.
    pub const LAST_NAME: &str = "lastName";
    /// Directory object id, before prefixing.
    pub const OBJECT_ID: &str = "objectId";
    /// Email address.
    pub const EMAIL: &str = "email";
}

/// How the session was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    /// National identity provider (Suomi.fi).
    Sfi,
    /// Organisation directory (Active Directory).
    Ad,
}

/// Citizen attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenProfile {
    /// National identification number.
    pub social_security_number: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Employee attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    /// `{prefix}:{objectId}`.
    pub external_id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Integration-specific business profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BusinessProfile {
    /// Citizen login.
    Citizen(CitizenProfile),
    /// Employee login.
    Employee(EmployeeProfile),
}

fn required(
    profile: &ValidatedProfile,
    field: &str,
    issuer: &str,
) -> Result<String, ProfileValidationError> {
    profile
        .str(field)
        .map(String::from)
        .ok_or_else(|| ProfileValidationError::Missing {
            field: field.to_string(),
            attribute: field.to_string(),
            issuer: issuer.to_string(),
        })
}

impl CitizenProfile {
    /// Builds the profile from validated fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema did not produce a required field.
    pub fn from_validated(
        profile: &ValidatedProfile,
        issuer: &str,
    ) -> Result<Self, ProfileValidationError> {
        Ok(Self {
            social_security_number: required(profile, fields::SOCIAL_SECURITY_NUMBER, issuer)?,
            first_name: required(profile, fields::FIRST_NAME, issuer)?,
            last_name: required(profile, fields::LAST_NAME, issuer)?,
        })
    }
}

impl EmployeeProfile {
    /// Builds the profile from validated fields, prefixing the object id.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema did not produce a required field.
    pub fn from_validated(
        profile: &ValidatedProfile,
        external_id_prefix: &str,
        issuer: &str,
    ) -> Result<Self, ProfileValidationError> {
        let object_id = required(profile, fields::OBJECT_ID, issuer)?;
        Ok(Self {
            external_id: format!("{external_id_prefix}:{object_id}"),
            first_name: required(profile, fields::FIRST_NAME, issuer)?,
            last_name: required(profile, fields::LAST_NAME, issuer)?,
            email: profile.str(fields::EMAIL).map(String::from),
        })
    }
}
