// src/services/teacher_service.rs
use crate::{
    error::{is_foreign_key_violation, AppError, AppResult, ConflictKind, NotFoundKind},
    models::{
        audit::{AuditAction, AuditTarget},
        teacher::{CreateTeacherPayload, Teacher, TeacherWithAccount},
        user::Role,
    },
    services::{audit_service, auth_service, user_service},
};
use sqlx::{SqliteExecutor, SqlitePool};

const TEACHER_COLUMNS: &str = "id, user_id, name, national_id, email, phone, created_at";

pub async fn find_teacher_by_id<'e, E>(executor: E, teacher_id: i64) -> AppResult<Option<Teacher>>
where
    E: SqliteExecutor<'e>,
{
    let teacher = sqlx::query_as::<_, Teacher>(&format!(
        "SELECT {} FROM teachers WHERE id = ?1",
        TEACHER_COLUMNS
    ))
    .bind(teacher_id)
    .fetch_optional(executor)
    .await?;
    Ok(teacher)
}

pub async fn find_teacher_by_user_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<Teacher>> {
    let teacher = sqlx::query_as::<_, Teacher>(&format!(
        "SELECT {} FROM teachers WHERE user_id = ?1",
        TEACHER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(db_pool)
    .await?;
    Ok(teacher)
}

pub async fn list_teachers(db_pool: &SqlitePool) -> AppResult<Vec<TeacherWithAccount>> {
    let teachers = sqlx::query_as::<_, TeacherWithAccount>(
        r#"
        SELECT t.id, t.user_id, t.name, t.national_id, t.email, t.phone,
               u.username, u.device_id, t.created_at
        FROM teachers t
        JOIN users u ON u.id = t.user_id
        ORDER BY t.name ASC
        "#,
    )
    .fetch_all(db_pool)
    .await?;
    Ok(teachers)
}

/// Creates the login account and the teacher profile in one transaction.
pub async fn create_teacher(
    db_pool: &SqlitePool,
    actor_user_id: Option<i64>,
    payload: &CreateTeacherPayload,
) -> AppResult<Teacher> {
    let name = payload.name.trim();
    if name.is_empty() || payload.username.trim().is_empty() {
        return Err(AppError::BadRequest("Name and username are required.".into()));
    }
    if payload.password.chars().count() < auth_service::MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters.",
            auth_service::MIN_PASSWORD_LEN
        )));
    }

    tracing::info!("Creating teacher '{}' (user '{}')", name, payload.username);
    let password_hash = auth_service::hash_password(&payload.password).await?;

    let mut tx = db_pool.begin().await?;
    let user_id = user_service::insert_user(&mut tx, &payload.username, &password_hash, Role::Teacher).await?;

    let teacher_id = sqlx::query(
        r#"
        INSERT INTO teachers (user_id, name, national_id, email, phone)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(blank_to_none(&payload.national_id))
    .bind(blank_to_none(&payload.email))
    .bind(blank_to_none(&payload.phone))
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    audit_service::record(
        &mut *tx,
        actor_user_id,
        AuditAction::Create,
        AuditTarget::Teacher,
        Some(teacher_id),
        &format!("Added teacher: {}", name),
    )
    .await?;

    let teacher = find_teacher_by_id(&mut *tx, teacher_id)
        .await?
        .ok_or(AppError::InternalServerError)?;
    tx.commit().await?;

    tracing::info!("Teacher {} created.", teacher.id);
    Ok(teacher)
}

/// Removes the teacher and its login account.
pub async fn delete_teacher(db_pool: &SqlitePool, actor_user_id: i64, teacher_id: i64) -> AppResult<()> {
    let mut tx = db_pool.begin().await?;
    let teacher = find_teacher_by_id(&mut *tx, teacher_id)
        .await?
        .ok_or(AppError::NotFound(NotFoundKind::Teacher))?;

    // teacher row and schedules go with the user; recorded attendance blocks the delete
    sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(teacher.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                tracing::warn!("Teacher {} has attendance records; delete refused.", teacher_id);
                AppError::Conflict(ConflictKind::HasAttendance)
            } else {
                e.into()
            }
        })?;

    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::Delete,
        AuditTarget::Teacher,
        Some(teacher_id),
        &format!("Deleted teacher: {}", teacher.name),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Teacher {} deleted by {}.", teacher_id, actor_user_id);
    Ok(())
}

/// Admin-only: unbinds the teacher's device so the next login binds a new one.
pub async fn reset_device(db_pool: &SqlitePool, actor_user_id: i64, teacher_id: i64) -> AppResult<()> {
    let mut tx = db_pool.begin().await?;
    let teacher = find_teacher_by_id(&mut *tx, teacher_id)
        .await?
        .ok_or(AppError::NotFound(NotFoundKind::Teacher))?;

    user_service::clear_device(&mut tx, teacher.user_id).await?;
    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::ResetDevice,
        AuditTarget::Teacher,
        Some(teacher_id),
        &format!("Reset device for teacher: {}", teacher.name),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Device reset for teacher {} by {}.", teacher_id, actor_user_id);
    Ok(())
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) fn sample_payload(username: &str) -> CreateTeacherPayload {
    CreateTeacherPayload {
        name: format!("Teacher {}", username),
        national_id: Some("198001012005011001".into()),
        email: Some(" ".into()),
        phone: None,
        username: username.into(),
        password: "rahasia1".into(),
    }
}
