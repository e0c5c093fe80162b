//! Session context passed explicitly into wizards and the grading view.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// The dashboard a user is signed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// University administrator.
    Admin,
    /// Department moderator.
    Moderator,
    /// Teaching staff.
    Teacher,
}

impl Role {
    /// Returns the role's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Teacher => "teacher",
        }
    }

    /// Returns true if the role may review and grade quiz attempts.
    pub fn can_grade(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Who is acting, in which role, and on which day.
///
/// Built once per request (or page) and handed down by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// The acting user's id.
    pub actor_id: String,
    /// The dashboard role of the acting user.
    pub role: Role,
    /// Reference date for "not in the future" checks.
    pub today: NaiveDate,
}

impl SessionContext {
    /// Creates a context dated today in local time.
    pub fn new(actor_id: impl Into<String>, role: Role) -> Self {
        Self::on(actor_id, role, Local::now().date_naive())
    }

    /// Creates a context with an explicit reference date.
    pub fn on(actor_id: impl Into<String>, role: Role, today: NaiveDate) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            today,
        }
    }
}
