// src/models/audit.rs
use serde::Serialize;
use sqlx::FromRow;

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_user_id: Option<i64>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<i64>,
    pub detail: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Delete,
    ResetDevice,
    ChangePassword,
    Bootstrap,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Delete => "DELETE",
            AuditAction::ResetDevice => "RESET_DEVICE",
            AuditAction::ChangePassword => "CHANGE_PASSWORD",
            AuditAction::Bootstrap => "BOOTSTRAP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTarget {
    User,
    Teacher,
    Class,
    Schedule,
}

impl AuditTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditTarget::User => "user",
            AuditTarget::Teacher => "teacher",
            AuditTarget::Class => "class",
            AuditTarget::Schedule => "schedule",
        }
    }
}
