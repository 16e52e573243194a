// src/services/class_service.rs
use crate::{
    error::{is_foreign_key_violation, AppError, AppResult, ConflictKind, NotFoundKind},
    models::{
        audit::{AuditAction, AuditTarget},
        class::{Class, CreateClassPayload},
    },
    services::audit_service,
};
use sqlx::{SqliteExecutor, SqlitePool};
use qrcode::{render::svg, QrCode};
use uuid::Uuid;

const CLASS_COLUMNS: &str = "id, name, grade, major, qr_token, created_at";

/// Opaque, unguessable class token: 128 random bits as 32 hex chars.
pub fn generate_qr_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Renders `payload` as an SVG QR code, sized for printing on an A4 sheet.
pub fn render_qr_svg(payload: &str) -> AppResult<String> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| {
        tracing::error!("QR encoding failed: {:?}", e);
        AppError::InternalServerError
    })?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Looks a class up by the token printed on its QR code.
pub async fn find_class_by_qr_token(db_pool: &SqlitePool, qr_token: &str) -> AppResult<Option<Class>> {
    let class = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes WHERE qr_token = ?1",
        CLASS_COLUMNS
    ))
    .bind(qr_token)
    .fetch_optional(db_pool)
    .await?;
    Ok(class)
}

pub async fn find_class_by_id<'e, E>(executor: E, class_id: i64) -> AppResult<Option<Class>>
where
    E: SqliteExecutor<'e>,
{
    let class = sqlx::query_as::<_, Class>(&format!("SELECT {} FROM classes WHERE id = ?1", CLASS_COLUMNS))
        .bind(class_id)
        .fetch_optional(executor)
        .await?;
    Ok(class)
}

pub async fn list_classes(db_pool: &SqlitePool) -> AppResult<Vec<Class>> {
    let classes = sqlx::query_as::<_, Class>(&format!(
        "SELECT {} FROM classes ORDER BY grade ASC, name ASC",
        CLASS_COLUMNS
    ))
    .fetch_all(db_pool)
    .await?;
    Ok(classes)
}

pub async fn create_class(
    db_pool: &SqlitePool,
    actor_user_id: i64,
    payload: &CreateClassPayload,
) -> AppResult<Class> {
    let name = payload.name.trim();
    let grade = payload.grade.trim();
    if name.is_empty() || grade.is_empty() {
        return Err(AppError::BadRequest("Class name and grade are required.".into()));
    }
    let major = payload.major.as_deref().map(str::trim).filter(|m| !m.is_empty());

    let mut tx = db_pool.begin().await?;
    let class_id = sqlx::query(
        r#"
        INSERT INTO classes (name, grade, major, qr_token)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(name)
    .bind(grade)
    .bind(major)
    .bind(generate_qr_token())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::Create,
        AuditTarget::Class,
        Some(class_id),
        &format!("Added class: {} {}", grade, name),
    )
    .await?;

    let class = find_class_by_id(&mut *tx, class_id)
        .await?
        .ok_or(AppError::InternalServerError)?;
    tx.commit().await?;

    tracing::info!("Class {} ({} {}) created.", class.id, class.grade, class.name);
    Ok(class)
}

pub async fn delete_class(db_pool: &SqlitePool, actor_user_id: i64, class_id: i64) -> AppResult<()> {
    let mut tx = db_pool.begin().await?;
    let rows = sqlx::query("DELETE FROM classes WHERE id = ?1")
        .bind(class_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                tracing::warn!("Class {} has attendance records; delete refused.", class_id);
                AppError::Conflict(ConflictKind::HasAttendance)
            } else {
                e.into()
            }
        })?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::NotFound(NotFoundKind::Class));
    }

    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::Delete,
        AuditTarget::Class,
        Some(class_id),
        &format!("Deleted class id: {}", class_id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Class {} deleted by {}.", class_id, actor_user_id);
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_class(name: &str) -> CreateClassPayload {
    CreateClassPayload {
        name: name.into(),
        grade: "X".into(),
        major: Some("IPA".into()),
    }
}

#[cfg(test)]
mod class_tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn qr_tokens_are_long_and_distinct() {
        let a = generate_qr_token();
        let b = generate_qr_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn qr_svg_is_rendered_for_a_token() {
        let svg = render_qr_svg(&generate_qr_token()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("#000000"));
    }

    #[tokio::test]
    async fn created_class_is_found_by_its_token() {
        let pool = test_pool().await;
        let class = create_class(&pool, 1, &sample_class("A")).await.unwrap();
        let found = find_class_by_qr_token(&pool, &class.qr_token).await.unwrap().unwrap();
        assert_eq!(found.id, class.id);
        assert!(find_class_by_qr_token(&pool, "not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_class_requires_name_and_grade() {
        let pool = test_pool().await;
        let payload = CreateClassPayload {
            name: " ".into(),
            grade: "XI".into(),
            major: None,
        };
        assert!(matches!(
            create_class(&pool, 1, &payload).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_missing_class_is_not_found() {
        let pool = test_pool().await;
        let class = create_class(&pool, 1, &sample_class("A")).await.unwrap();
        delete_class(&pool, 1, class.id).await.unwrap();
        assert!(matches!(
            delete_class(&pool, 1, class.id).await,
            Err(AppError::NotFound(NotFoundKind::Class))
        ));
        assert!(list_classes(&pool).await.unwrap().is_empty());
    }
}
