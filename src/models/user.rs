// src/models/user.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String, // "admin" | "teacher"
    pub device_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Public view of an account (no hash).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub device_id: Option<String>,
    pub teacher_id: Option<i64>,
    pub teacher_name: Option<String>,
    pub created_at: String,
}

/// The authenticated caller, resolved once per request by `mw_auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Caller {
    Teacher {
        user_id: i64,
        teacher_id: i64,
        username: String,
    },
    Admin {
        user_id: i64,
        username: String,
    },
}

impl Caller {
    pub fn user_id(&self) -> i64 {
        match self {
            Caller::Teacher { user_id, .. } | Caller::Admin { user_id, .. } => *user_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin { .. })
    }

    pub fn teacher_id(&self) -> Option<i64> {
        match self {
            Caller::Teacher { teacher_id, .. } => Some(*teacher_id),
            Caller::Admin { .. } => None,
        }
    }

    /// Admins see everything; teachers only their own data.
    pub fn can_view_teacher(&self, teacher_id: i64) -> bool {
        self.is_admin() || self.teacher_id() == Some(teacher_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    #[serde(alias = "oldPassword")]
    pub old_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}
