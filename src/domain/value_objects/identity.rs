//! Caller identity and role-based access checks.
//!
//! Roles arrive as a list of strings in the bearer token; authorization is
//! plain membership testing against that list.

use serde::{Deserialize, Serialize};

/// Well-known role names.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const INSTRUCTOR: &str = "instructor";
    pub const STUDENT: &str = "student";

    /// Roles allowed to manage course rooms and send notifications.
    pub const STAFF: &[&str] = &[ADMIN, INSTRUCTOR];
}

/// Set of role names granted to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(Vec<String>);

impl Roles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    /// Case-insensitive role check.
    pub fn has(&self, role: &str) -> bool {
        self.0.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn has_any(&self, required: &[&str]) -> bool {
        required.iter().any(|role| self.has(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has(roles::ADMIN)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub tenant_id: i64,
    pub roles: Roles,
}

impl Actor {
    pub fn new(user_id: i64, tenant_id: i64, roles: Roles) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.is_admin()
    }

    pub fn is_staff(&self) -> bool {
        self.roles.has_any(roles::STAFF)
    }
}
