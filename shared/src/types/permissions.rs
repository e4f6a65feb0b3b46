//! Materialized permissions and constraint-evaluation context

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Permissions of the acting user on one collection or link type.
///
/// An absent entry in the permission map means "no access".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllowedPermissions {
    /// Read documents created by the acting user
    pub read: bool,
    pub write: bool,
    pub manage: bool,

    /// Read every document regardless of author
    pub read_all: bool,
    pub write_all: bool,
}

impl AllowedPermissions {
    /// Every permission granted
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            manage: true,
            read_all: true,
            write_all: true,
        }
    }

    /// Read access to own documents only
    pub fn read_own() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,

    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    /// Name shown for this user, falling back to the email
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,

    /// Member user ids
    #[serde(default)]
    pub users: Vec<String>,
}

/// Context used by the script to evaluate attribute-level constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstraintData {
    pub current_user: Option<User>,
    pub users: Vec<User>,
    pub teams: Vec<Team>,

    /// IANA time zone name, e.g. `Europe/Prague`
    pub timezone: Option<String>,

    /// Localized duration unit labels (`d`, `h`, `m`, ...)
    pub duration_units: HashMap<String, String>,
}

impl ConstraintData {
    /// Look up a user by email
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    /// Teams the given user belongs to
    pub fn teams_of<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Team> + 'a {
        self.teams
            .iter()
            .filter(move |t| t.users.iter().any(|u| u == user_id))
    }
}
