// src/services/audit_service.rs
use crate::{
    error::AppResult,
    models::audit::{AuditAction, AuditEntry, AuditTarget},
};
use sqlx::{Sqlite, SqliteExecutor, SqlitePool};

pub const AUDIT_PAGE_SIZE: i64 = 100;

/// Appends one audit entry. Accepts a pool or an open transaction so the
/// entry commits together with the change it describes.
pub async fn record<'e, E>(
    executor: E,
    actor_user_id: Option<i64>,
    action: AuditAction,
    target: AuditTarget,
    target_id: Option<i64>,
    detail: &str,
) -> AppResult<()>
where
    E: SqliteExecutor<'e>,
{
    tracing::debug!(
        "Audit: {} {} {:?} by {:?}",
        action.as_str(),
        target.as_str(),
        target_id,
        actor_user_id
    );
    sqlx::query::<Sqlite>(
        r#"
        INSERT INTO audit_log (actor_user_id, action, target_type, target_id, detail)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(actor_user_id)
    .bind(action.as_str())
    .bind(target.as_str())
    .bind(target_id)
    .bind(detail)
    .execute(executor)
    .await?;
    Ok(())
}

/// Most recent entries first.
pub async fn list_recent(db_pool: &SqlitePool) -> AppResult<Vec<AuditEntry>> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT id, actor_user_id, action, target_type, target_id, detail, created_at
        FROM audit_log
        ORDER BY id DESC
        LIMIT ?1
        "#,
    )
    .bind(AUDIT_PAGE_SIZE)
    .fetch_all(db_pool)
    .await?;
    Ok(entries)
}
