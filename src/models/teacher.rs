// src/models/teacher.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Teacher {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
}

/// Teacher joined with its account (username and device binding).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TeacherWithAccount {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: String,
    pub device_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeacherPayload {
    pub name: String,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub username: String,
    pub password: String,
}
