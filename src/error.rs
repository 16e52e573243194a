// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use thiserror::Error;

/// What could not be found. The first two are the scan rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    InvalidQrToken,
    NoScheduledLesson,
    Teacher,
    Class,
    Schedule,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidStateKind {
    OutsideLessonWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyScanned,
    UsernameTaken,
    SlotTaken,
    HasAttendance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    DeviceMismatch,
    AdminOnly,
    TeacherOnly,
    NotOwner,
}

impl NotFoundKind {
    fn code(self) -> &'static str {
        match self {
            NotFoundKind::InvalidQrToken => "invalid_qr_token",
            NotFoundKind::NoScheduledLesson => "no_scheduled_lesson",
            NotFoundKind::Teacher => "teacher_not_found",
            NotFoundKind::Class => "class_not_found",
            NotFoundKind::Schedule => "schedule_not_found",
            NotFoundKind::User => "user_not_found",
        }
    }

    fn message(self) -> &'static str {
        match self {
            NotFoundKind::InvalidQrToken => "QR code is not valid.",
            NotFoundKind::NoScheduledLesson => "No lesson is scheduled for this class and period today.",
            NotFoundKind::Teacher => "Teacher not found.",
            NotFoundKind::Class => "Class not found.",
            NotFoundKind::Schedule => "Schedule not found.",
            NotFoundKind::User => "User not found.",
        }
    }
}

impl ConflictKind {
    fn code(self) -> &'static str {
        match self {
            ConflictKind::AlreadyScanned => "already_scanned",
            ConflictKind::UsernameTaken => "username_taken",
            ConflictKind::SlotTaken => "slot_taken",
            ConflictKind::HasAttendance => "has_attendance",
        }
    }

    fn message(self) -> &'static str {
        match self {
            ConflictKind::AlreadyScanned => "Attendance for this period has already been recorded today.",
            ConflictKind::UsernameTaken => "Username is already in use.",
            ConflictKind::SlotTaken => "This teacher already has a lesson in that class, day and period.",
            ConflictKind::HasAttendance => "Attendance has been recorded for this entry, so it cannot be deleted.",
        }
    }

    // Scanning clients treat a duplicate scan as a plain bad request.
    fn status(self) -> StatusCode {
        match self {
            ConflictKind::AlreadyScanned => StatusCode::BAD_REQUEST,
            _ => StatusCode::CONFLICT,
        }
    }
}

impl ForbiddenKind {
    fn code(self) -> &'static str {
        match self {
            ForbiddenKind::DeviceMismatch => "device_mismatch",
            ForbiddenKind::AdminOnly => "admin_only",
            ForbiddenKind::TeacherOnly => "teacher_only",
            ForbiddenKind::NotOwner => "not_owner",
        }
    }

    fn message(self) -> &'static str {
        match self {
            ForbiddenKind::DeviceMismatch => {
                "This account is bound to another device. Ask an administrator to reset it."
            }
            ForbiddenKind::AdminOnly => "Only administrators may do this.",
            ForbiddenKind::TeacherOnly => "Only teachers may do this.",
            ForbiddenKind::NotOwner => "You do not have access to this data.",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("password hashing failed")]
    PasswordHashingError,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session error: {0}")]
    SessionError(String),

    #[error("not authenticated")]
    Unauthorized,

    #[error("not found: {0:?}")]
    NotFound(NotFoundKind),

    #[error("invalid state: {0:?}")]
    InvalidState(InvalidStateKind),

    #[error("conflict: {0:?}")]
    Conflict(ConflictKind),

    #[error("forbidden: {0:?}")]
    Forbidden(ForbiddenKind),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unexpected internal error")]
    InternalServerError,
}

impl AppError {
    /// Status code and the `(code, message)` pair shown to the client.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(kind) => (StatusCode::NOT_FOUND, kind.code(), kind.message().into()),
            AppError::InvalidState(InvalidStateKind::OutsideLessonWindow) => (
                StatusCode::BAD_REQUEST,
                "outside_lesson_window",
                "Attendance can only be recorded during the scheduled lesson time.".into(),
            ),
            AppError::Conflict(kind) => (kind.status(), kind.code(), kind.message().into()),
            AppError::Forbidden(kind) => (StatusCode::FORBIDDEN, kind.code(), kind.message().into()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid username or password.".into(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Login required.".into(),
            ),
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "Error while accessing data.".into(),
            ),
            AppError::PasswordHashingError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Error while processing credentials.".into(),
            ),
            AppError::SessionError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Error while handling your session.".into(),
            ),
            AppError::Config(_) | AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An unexpected error occurred.".into(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::warn!(%status, code, "request rejected");
        }

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Returns true when a sqlx error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err.code().is_some_and(|c| c == "2067" || c == "1555")
        }
        _ => false,
    }
}

/// Returns true when a sqlx error is a FOREIGN KEY constraint violation.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_foreign_key_violation() || db_err.code().is_some_and(|c| c == "787")
        }
        _ => false,
    }
}

pub type AppResult<T = ()> = Result<T, AppError>;
