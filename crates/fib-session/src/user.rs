//! Application session user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};

/// Category of an application user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    /// End user authenticated with a national identity. The only category
    /// allowed to have no roles.
    Citizen,
    /// Staff member authenticated through the organisation directory.
    Employee,
}

impl UserType {
    /// Whether a user of this type may hold zero roles.
    #[must_use]
    pub const fn allows_no_roles(self) -> bool {
        matches!(self, Self::Citizen)
    }
}

/// The user an application session belongs to.
///
/// Constructed only through [`SessionUser::new`] (or deserialization, which
/// applies the same checks), so the id is never nil and role-less users are
/// always citizens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "UncheckedUser")]
pub struct SessionUser {
    id: Uuid,
    user_type: UserType,
    global_roles: Vec<String>,
    all_scoped_roles: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedUser {
    id: Uuid,
    user_type: UserType,
    #[serde(default)]
    global_roles: Vec<String>,
    #[serde(default)]
    all_scoped_roles: Vec<String>,
}

impl TryFrom<UncheckedUser> for SessionUser {
    type Error = SessionError;

    fn try_from(u: UncheckedUser) -> SessionResult<Self> {
        Self::new(u.id, u.user_type, u.global_roles, u.all_scoped_roles)
    }
}

impl SessionUser {
    /// Creates a session user.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidUser`] for a nil id, or for a
    /// non-citizen without any role.
    pub fn new(
        id: Uuid,
        user_type: UserType,
        global_roles: Vec<String>,
        all_scoped_roles: Vec<String>,
    ) -> SessionResult<Self> {
        if id.is_nil() {
            return Err(SessionError::InvalidUser("nil user id".to_string()));
        }
        if global_roles.is_empty() && all_scoped_roles.is_empty() && !user_type.allows_no_roles() {
            return Err(SessionError::InvalidUser(format!(
                "{user_type:?} user {id} has no roles"
            )));
        }
        Ok(Self {
            id,
            user_type,
            global_roles,
            all_scoped_roles,
        })
    }

    /// Creates a citizen user, which carries no roles.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidUser`] for a nil id.
    pub fn citizen(id: Uuid) -> SessionResult<Self> {
        Self::new(id, UserType::Citizen, Vec::new(), Vec::new())
    }

    /// Internal user id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// User category.
    #[must_use]
    pub const fn user_type(&self) -> UserType {
        self.user_type
    }

    /// Roles valid everywhere.
    #[must_use]
    pub fn global_roles(&self) -> &[String] {
        &self.global_roles
    }

    /// Roles scoped to some unit, flattened.
    #[must_use]
    pub fn all_scoped_roles(&self) -> &[String] {
        &self.all_scoped_roles
    }
}
