// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult, ForbiddenKind},
    models::{
        audit::{AuditAction, AuditTarget},
        teacher::Teacher,
        user::{Caller, Role, User},
    },
    services::{audit_service, teacher_service, user_service},
};
use sqlx::SqlitePool;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Checks a password against the stored bcrypt hash.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(&password, &stored_hash))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking failed (verify_password): {:?}", e);
            AppError::InternalServerError
        })?
        .map_err(|e| {
            tracing::error!("bcrypt verify failed: {:?}", e);
            AppError::PasswordHashingError
        })
}

/// Produces a bcrypt hash for a password.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking failed (hash_password): {:?}", e);
            AppError::InternalServerError
        })?
        .map_err(|e| {
            tracing::error!("bcrypt hash failed: {:?}", e);
            AppError::PasswordHashingError
        })
}

/// What a teacher login does with the supplied device id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCheck {
    /// Nothing bound yet: bind the supplied device.
    Bind,
    /// Supplied device matches the binding.
    Match,
}

/// Single-slot device binding. unset -> bound on first login -> unset only by admin reset.
pub fn check_device(stored: Option<&str>, supplied: &str) -> AppResult<DeviceCheck> {
    match stored {
        None => Ok(DeviceCheck::Bind),
        Some(bound) if bound == supplied => Ok(DeviceCheck::Match),
        Some(_) => Err(AppError::Forbidden(ForbiddenKind::DeviceMismatch)),
    }
}

/// Result of a successful login: the account and, for teachers, the profile.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub caller: Caller,
    pub teacher: Option<Teacher>,
}

/// Verifies credentials and enforces device binding for teachers.
/// Unknown username and wrong password are indistinguishable to the caller.
pub async fn login(
    db_pool: &SqlitePool,
    username: &str,
    password: &str,
    device_id: Option<&str>,
) -> AppResult<LoginOutcome> {
    let user = match user_service::find_user_by_username(db_pool, username).await? {
        Some(u) => u,
        None => {
            tracing::warn!("Login failed: unknown user '{}'", username);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash).await? {
        tracing::warn!("Login failed: wrong password for '{}'", username);
        return Err(AppError::InvalidCredentials);
    }

    let role = user.role().ok_or_else(|| {
        tracing::error!("User {} has unknown role '{}'", user.id, user.role);
        AppError::InternalServerError
    })?;

    match role {
        Role::Admin => Ok(LoginOutcome {
            caller: Caller::Admin {
                user_id: user.id,
                username: user.username.clone(),
            },
            user,
            teacher: None,
        }),
        Role::Teacher => {
            let device_id = device_id
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| AppError::BadRequest("device_id is required for teacher login.".into()))?;

            if check_device(user.device_id.as_deref(), device_id)? == DeviceCheck::Bind
                && !user_service::bind_device(db_pool, user.id, device_id).await?
            {
                // Lost a race with another first login; compare against the winner.
                let current = user_service::find_user_by_id(db_pool, user.id).await?;
                check_device(current.and_then(|u| u.device_id).as_deref(), device_id)?;
            }

            let teacher = teacher_service::find_teacher_by_user_id(db_pool, user.id)
                .await?
                .ok_or_else(|| {
                    tracing::error!("Teacher account {} has no teacher profile", user.id);
                    AppError::InternalServerError
                })?;

            let mut user = user;
            user.device_id = Some(device_id.to_string());
            Ok(LoginOutcome {
                caller: Caller::Teacher {
                    user_id: user.id,
                    teacher_id: teacher.id,
                    username: user.username.clone(),
                },
                user,
                teacher: Some(teacher),
            })
        }
    }
}

/// Resolves a stored session user id into a caller. `None` if the account is gone.
pub async fn resolve_caller(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<Caller>> {
    let Some(user) = user_service::find_user_by_id(db_pool, user_id).await? else {
        return Ok(None);
    };
    match user.role() {
        Some(Role::Admin) => Ok(Some(Caller::Admin {
            user_id: user.id,
            username: user.username,
        })),
        Some(Role::Teacher) => {
            let teacher = teacher_service::find_teacher_by_user_id(db_pool, user.id).await?;
            Ok(teacher.map(|t| Caller::Teacher {
                user_id: user.id,
                teacher_id: t.id,
                username: user.username,
            }))
        }
        None => {
            tracing::error!("User {} has unknown role '{}'", user.id, user.role);
            Ok(None)
        }
    }
}

pub async fn change_password(
    db_pool: &SqlitePool,
    user_id: i64,
    old_password: &str,
    new_password: &str,
) -> AppResult<()> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "New password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }

    let user = user_service::find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !verify_password(old_password, &user.password_hash).await? {
        tracing::warn!("Password change rejected for {}: wrong old password", user_id);
        return Err(AppError::InvalidCredentials);
    }

    let new_hash = hash_password(new_password).await?;
    user_service::update_password_hash(db_pool, user_id, &new_hash).await?;
    audit_service::record(
        db_pool,
        Some(user_id),
        AuditAction::ChangePassword,
        AuditTarget::User,
        Some(user_id),
        "Changed password",
    )
    .await?;

    tracing::info!("Password changed for user {}", user_id);
    Ok(())
}

#[cfg(test)]
mod auth_tests {
    use super::*;
    use crate::{db::test_pool, models::teacher::CreateTeacherPayload};

    async fn seed_teacher(pool: &SqlitePool) -> Teacher {
        let payload = CreateTeacherPayload {
            name: "Budi Santoso".into(),
            national_id: Some("1987".into()),
            email: None,
            phone: None,
            username: "budi".into(),
            password: "rahasia1".into(),
        };
        teacher_service::create_teacher(pool, None, &payload).await.unwrap()
    }

    #[test]
    fn device_check_transitions() {
        assert_eq!(check_device(None, "a").unwrap(), DeviceCheck::Bind);
        assert_eq!(check_device(Some("a"), "a").unwrap(), DeviceCheck::Match);
        assert!(matches!(
            check_device(Some("a"), "b"),
            Err(AppError::Forbidden(ForbiddenKind::DeviceMismatch))
        ));
    }

    #[tokio::test]
    async fn first_teacher_login_binds_the_device() {
        let pool = test_pool().await;
        let teacher = seed_teacher(&pool).await;

        let outcome = login(&pool, "budi", "rahasia1", Some("phone-1")).await.unwrap();
        assert_eq!(outcome.caller.teacher_id(), Some(teacher.id));
        assert_eq!(outcome.user.device_id.as_deref(), Some("phone-1"));

        // same device again is fine
        login(&pool, "budi", "rahasia1", Some("phone-1")).await.unwrap();

        let err = login(&pool, "budi", "rahasia1", Some("phone-2")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ForbiddenKind::DeviceMismatch)));
    }

    #[tokio::test]
    async fn reset_device_allows_a_new_binding() {
        let pool = test_pool().await;
        let teacher = seed_teacher(&pool).await;
        login(&pool, "budi", "rahasia1", Some("phone-1")).await.unwrap();

        teacher_service::reset_device(&pool, 1, teacher.id).await.unwrap();
        let outcome = login(&pool, "budi", "rahasia1", Some("phone-2")).await.unwrap();
        assert_eq!(outcome.user.device_id.as_deref(), Some("phone-2"));
    }

    #[tokio::test]
    async fn teacher_login_requires_a_device_id() {
        let pool = test_pool().await;
        seed_teacher(&pool).await;
        let err = login(&pool, "budi", "rahasia1", Some("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn bad_credentials_look_the_same() {
        let pool = test_pool().await;
        seed_teacher(&pool).await;
        let unknown = login(&pool, "nobody", "x", None).await.unwrap_err();
        let wrong = login(&pool, "budi", "wrong-pass", Some("p")).await.unwrap_err();
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn admin_login_ignores_devices() {
        let pool = test_pool().await;
        user_service::create_admin(&pool, "admin", "admin123").await;
        let outcome = login(&pool, "admin", "admin123", None).await.unwrap();
        assert!(outcome.caller.is_admin());
        assert!(outcome.user.device_id.is_none());
    }

    #[tokio::test]
    async fn change_password_checks_the_old_one() {
        let pool = test_pool().await;
        let id = user_service::create_admin(&pool, "admin", "admin123").await;

        let err = change_password(&pool, id, "nope", "newpass1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let err = change_password(&pool, id, "admin123", "short").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        change_password(&pool, id, "admin123", "newpass1").await.unwrap();
        login(&pool, "admin", "newpass1", None).await.unwrap();
    }

    #[tokio::test]
    async fn resolve_caller_builds_the_right_variant() {
        let pool = test_pool().await;
        let teacher = seed_teacher(&pool).await;
        let caller = resolve_caller(&pool, teacher.user_id).await.unwrap().unwrap();
        assert_eq!(caller.teacher_id(), Some(teacher.id));
        assert!(resolve_caller(&pool, 999).await.unwrap().is_none());
    }
}
