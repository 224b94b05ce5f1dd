use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles recognised by the page endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to the admin panel.
    Viewer,
    /// Can edit page documents.
    Editor,
    /// Full administrative access.
    Admin,
}

/// Roles allowed to read and save page documents.
pub const PAGE_EDITOR_ROLES: &[Role] = &[Role::Admin, Role::Editor];

/// Roles allowed to trigger a full reconciliation sweep.
pub const SYNC_ROLES: &[Role] = &[Role::Admin];

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::Editor => write!(f, "editor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Parse a role from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Some(Role::Viewer),
            "editor" => Some(Role::Editor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The caller behind a request, as established by the authorizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub roles: Vec<Role>,
}

impl AuthenticatedUser {
    /// Returns `true` if the user holds at least one of `allowed`.
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        self.roles.iter().any(|role| allowed.contains(role))
    }
}
