// src/services/user_service.rs
use crate::{
    config::BootstrapAdmin,
    error::{is_foreign_key_violation, is_unique_violation, AppError, AppResult, ConflictKind, NotFoundKind},
    models::{
        audit::{AuditAction, AuditTarget},
        user::{Role, User, UserSummary},
    },
    services::{audit_service, auth_service},
};
use sqlx::{SqliteConnection, SqlitePool};

const USER_COLUMNS: &str = "id, username, password_hash, role, device_id, created_at";

pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by id: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

pub async fn find_user_by_username(db_pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by username: {}", username);
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1",
        USER_COLUMNS
    ))
    .bind(username.trim())
    .fetch_optional(db_pool)
    .await?;
    Ok(user)
}

/// All accounts, with the teacher profile when there is one.
pub async fn list_users(db_pool: &SqlitePool) -> AppResult<Vec<UserSummary>> {
    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.role, u.device_id,
               t.id AS teacher_id, t.name AS teacher_name, u.created_at
        FROM users u
        LEFT JOIN teachers t ON t.user_id = u.id
        ORDER BY u.id ASC
        "#,
    )
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("Found {} users.", users.len());
    Ok(users)
}

/// Inserts a user row on an open connection/transaction. A taken username
/// becomes `Conflict(UsernameTaken)`.
pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
    role: Role,
) -> AppResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, role)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(username.trim())
    .bind(password_hash)
    .bind(role.as_str())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!("Cannot create user: username '{}' already exists.", username);
            Err(AppError::Conflict(ConflictKind::UsernameTaken))
        }
        Err(e) => Err(e.into()),
    }
}

/// Binds a device to an account that has none. Returns false if a device
/// was bound concurrently, so the caller can re-check.
pub async fn bind_device(db_pool: &SqlitePool, user_id: i64, device_id: &str) -> AppResult<bool> {
    let rows = sqlx::query("UPDATE users SET device_id = ?1 WHERE id = ?2 AND device_id IS NULL")
        .bind(device_id)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    Ok(rows == 1)
}

/// Clears the device binding (admin reset).
pub async fn clear_device(conn: &mut SqliteConnection, user_id: i64) -> AppResult<()> {
    let rows = sqlx::query("UPDATE users SET device_id = NULL WHERE id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::NotFound(NotFoundKind::User));
    }
    Ok(())
}

pub async fn update_password_hash(db_pool: &SqlitePool, user_id: i64, password_hash: &str) -> AppResult<()> {
    let rows = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(password_hash)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows == 0 {
        tracing::warn!("Password change failed: user {} not found.", user_id);
        return Err(AppError::NotFound(NotFoundKind::User));
    }
    Ok(())
}

/// Deletes an account (and its teacher profile via cascade). Admins may not
/// delete themselves.
pub async fn delete_user(db_pool: &SqlitePool, actor_user_id: i64, user_id: i64) -> AppResult<()> {
    if actor_user_id == user_id {
        return Err(AppError::BadRequest("You cannot delete your own account.".into()));
    }

    let mut tx = db_pool.begin().await?;
    let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    let username = username.ok_or(AppError::NotFound(NotFoundKind::User))?;

    sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                tracing::warn!("User {} is a teacher with attendance records; delete refused.", user_id);
                AppError::Conflict(ConflictKind::HasAttendance)
            } else {
                e.into()
            }
        })?;

    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::Delete,
        AuditTarget::User,
        Some(user_id),
        &format!("Deleted user: {}", username),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("User '{}' ({}) deleted by {}.", username, user_id, actor_user_id);
    Ok(())
}

/// Creates the configured admin account when no admin exists yet.
pub async fn ensure_bootstrap_admin(db_pool: &SqlitePool, admin: &BootstrapAdmin) -> AppResult<bool> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(db_pool)
        .await?;
    if admins > 0 {
        tracing::debug!("Admin account already present; skipping bootstrap.");
        return Ok(false);
    }

    let password_hash = auth_service::hash_password(&admin.password).await?;
    let mut tx = db_pool.begin().await?;
    let user_id = insert_user(&mut tx, &admin.username, &password_hash, Role::Admin).await?;
    audit_service::record(
        &mut *tx,
        None,
        AuditAction::Bootstrap,
        AuditTarget::User,
        Some(user_id),
        &format!("Bootstrap admin created: {}", admin.username),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Bootstrap admin '{}' created.", admin.username);
    Ok(true)
}

#[cfg(test)]
pub(crate) async fn create_admin(db_pool: &SqlitePool, username: &str, password: &str) -> i64 {
    let hash = auth_service::hash_password(password).await.unwrap();
    let mut conn = db_pool.acquire().await.unwrap();
    insert_user(&mut conn, username, &hash, Role::Admin).await.unwrap()
}

#[cfg(test)]
mod user_tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn bootstrap_admin_runs_once() {
        let pool = test_pool().await;
        let admin = BootstrapAdmin {
            username: "admin".into(),
            password: "admin123".into(),
        };
        assert!(ensure_bootstrap_admin(&pool, &admin).await.unwrap());
        assert!(!ensure_bootstrap_admin(&pool, &admin).await.unwrap());

        let user = find_user_by_username(&pool, "admin").await.unwrap().unwrap();
        assert_eq!(user.role(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let pool = test_pool().await;
        create_admin(&pool, "root", "secret1").await;
        let mut conn = pool.acquire().await.unwrap();
        let err = insert_user(&mut conn, "ROOT", "x", Role::Admin).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ConflictKind::UsernameTaken)));
    }

    #[tokio::test]
    async fn admins_cannot_delete_themselves() {
        let pool = test_pool().await;
        let id = create_admin(&pool, "root", "secret1").await;
        let err = delete_user(&pool, id, id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let other = create_admin(&pool, "other", "secret2").await;
        delete_user(&pool, id, other).await.unwrap();
        assert!(find_user_by_id(&pool, other).await.unwrap().is_none());
        let err = delete_user(&pool, id, other).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(NotFoundKind::User)));
    }

    #[tokio::test]
    async fn device_binds_only_once() {
        let pool = test_pool().await;
        let id = create_admin(&pool, "root", "secret1").await;
        assert!(bind_device(&pool, id, "phone-a").await.unwrap());
        assert!(!bind_device(&pool, id, "phone-b").await.unwrap());
        let user = find_user_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(user.device_id.as_deref(), Some("phone-a"));
    }
}
