// src/services/schedule_service.rs
use crate::{
    clock::parse_weekday,
    error::{is_unique_violation, AppError, AppResult, ConflictKind, NotFoundKind},
    models::{
        audit::{AuditAction, AuditTarget},
        schedule::{CreateSchedulePayload, LessonWindow, ScheduleDetail, ScheduleSlot},
    },
    services::{audit_service, class_service, teacher_service},
};
use sqlx::SqlitePool;

const SLOT_COLUMNS: &str =
    "id, teacher_id, class_id, weekday, period_index, start_time, end_time, subject, created_at";

const DETAIL_SELECT: &str = r#"
    SELECT s.id, s.teacher_id, t.name AS teacher_name, t.national_id,
           s.class_id, c.name AS class_name, c.grade, c.major,
           s.weekday, s.period_index, s.start_time, s.end_time, s.subject
    FROM schedules s
    JOIN teachers t ON t.id = s.teacher_id
    JOIN classes c ON c.id = s.class_id
"#;

const WEEKDAY_ORDER: &str = "CASE s.weekday WHEN 'monday' THEN 1 WHEN 'tuesday' THEN 2 \
    WHEN 'wednesday' THEN 3 WHEN 'thursday' THEN 4 WHEN 'friday' THEN 5 \
    WHEN 'saturday' THEN 6 ELSE 7 END";

/// The single slot for (teacher, class, weekday, period), if configured.
/// `weekday` must already be the canonical key.
pub async fn find_schedule_slot(
    db_pool: &SqlitePool,
    teacher_id: i64,
    class_id: i64,
    weekday: &str,
    period_index: i64,
) -> AppResult<Option<ScheduleSlot>> {
    tracing::debug!(
        "Looking up slot teacher={} class={} day={} period={}",
        teacher_id,
        class_id,
        weekday,
        period_index
    );
    let slot = sqlx::query_as::<_, ScheduleSlot>(&format!(
        r#"
        SELECT {}
        FROM schedules
        WHERE teacher_id = ?1 AND class_id = ?2 AND weekday = ?3 AND period_index = ?4
        "#,
        SLOT_COLUMNS
    ))
    .bind(teacher_id)
    .bind(class_id)
    .bind(weekday)
    .bind(period_index)
    .fetch_optional(db_pool)
    .await?;
    Ok(slot)
}

pub async fn list_schedules(db_pool: &SqlitePool) -> AppResult<Vec<ScheduleDetail>> {
    let rows = sqlx::query_as::<_, ScheduleDetail>(&format!(
        "{} ORDER BY t.name ASC, {} ASC, s.period_index ASC",
        DETAIL_SELECT, WEEKDAY_ORDER
    ))
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

pub async fn list_schedules_for_teacher(db_pool: &SqlitePool, teacher_id: i64) -> AppResult<Vec<ScheduleDetail>> {
    let rows = sqlx::query_as::<_, ScheduleDetail>(&format!(
        "{} WHERE s.teacher_id = ?1 ORDER BY {} ASC, s.period_index ASC",
        DETAIL_SELECT, WEEKDAY_ORDER
    ))
    .bind(teacher_id)
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

pub async fn create_schedule(
    db_pool: &SqlitePool,
    actor_user_id: i64,
    payload: &CreateSchedulePayload,
) -> AppResult<ScheduleSlot> {
    let weekday = parse_weekday(&payload.weekday)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown weekday: {}", payload.weekday)))?;
    if payload.period_index < 1 {
        return Err(AppError::BadRequest("period_index must be 1 or greater.".into()));
    }
    let window = LessonWindow::parse(&payload.start_time, &payload.end_time)
        .ok_or_else(|| AppError::BadRequest("start_time and end_time must be HH:MM.".into()))?;
    if window.start >= window.end {
        return Err(AppError::BadRequest("start_time must be before end_time.".into()));
    }
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::BadRequest("subject is required.".into()));
    }

    let mut tx = db_pool.begin().await?;
    if teacher_service::find_teacher_by_id(&mut *tx, payload.teacher_id).await?.is_none() {
        return Err(AppError::NotFound(NotFoundKind::Teacher));
    }
    if class_service::find_class_by_id(&mut *tx, payload.class_id).await?.is_none() {
        return Err(AppError::NotFound(NotFoundKind::Class));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO schedules (teacher_id, class_id, weekday, period_index, start_time, end_time, subject)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(payload.teacher_id)
    .bind(payload.class_id)
    .bind(weekday)
    .bind(payload.period_index)
    .bind(window.start.format("%H:%M").to_string())
    .bind(window.end.format("%H:%M").to_string())
    .bind(subject)
    .execute(&mut *tx)
    .await;

    let schedule_id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(
                "Slot already taken: teacher={} class={} day={} period={}",
                payload.teacher_id,
                payload.class_id,
                weekday,
                payload.period_index
            );
            return Err(AppError::Conflict(ConflictKind::SlotTaken));
        }
        Err(e) => return Err(e.into()),
    };

    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::Create,
        AuditTarget::Schedule,
        Some(schedule_id),
        &format!("Added schedule: {} for class {}", subject, payload.class_id),
    )
    .await?;

    let slot = sqlx::query_as::<_, ScheduleSlot>(&format!("SELECT {} FROM schedules WHERE id = ?1", SLOT_COLUMNS))
        .bind(schedule_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Schedule {} created ({} period {}).", slot.id, slot.weekday, slot.period_index);
    Ok(slot)
}

pub async fn delete_schedule(db_pool: &SqlitePool, actor_user_id: i64, schedule_id: i64) -> AppResult<()> {
    let mut tx = db_pool.begin().await?;
    let rows = sqlx::query("DELETE FROM schedules WHERE id = ?1")
        .bind(schedule_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::NotFound(NotFoundKind::Schedule));
    }

    audit_service::record(
        &mut *tx,
        Some(actor_user_id),
        AuditAction::Delete,
        AuditTarget::Schedule,
        Some(schedule_id),
        &format!("Deleted schedule id: {}", schedule_id),
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn slot_payload(teacher_id: i64, class_id: i64, weekday: &str, period: i64, start: &str, end: &str) -> CreateSchedulePayload {
    CreateSchedulePayload {
        teacher_id,
        class_id,
        weekday: weekday.into(),
        period_index: period,
        start_time: start.into(),
        end_time: end.into(),
        subject: "Matematika".into(),
    }
}
