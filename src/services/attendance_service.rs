// src/services/attendance_service.rs
//! Attendance scans. `record_scan` decides whether one QR scan is accepted and,
//! if so, writes exactly one attendance row. Checks run in a fixed order and
//! the first failure is the answer:
//!
//! 1. QR token -> class (`NotFound(InvalidQrToken)`)
//! 2. (teacher, class, today's weekday, period) -> slot (`NotFound(NoScheduledLesson)`)
//! 3. now (HH:MM) within `[start, end]` (`InvalidState(OutsideLessonWindow)`)
//! 4. no record yet for (teacher, class, period) today (`Conflict(AlreadyScanned)`)
//! 5. insert
//!
//! Every rejection performs zero writes. The UNIQUE index on
//! (teacher, class, period, scan_date) backs step 4 so two concurrent scans
//! cannot both be stored.

use crate::{
    clock::{time_of_day, to_storage_timestamp, Clock, DayRange},
    error::{is_unique_violation, AppError, AppResult, ConflictKind, InvalidStateKind, NotFoundKind},
    models::attendance::{AttendanceRecord, ScanRequest, TeacherAttendanceRow},
    services::{class_service, schedule_service},
};
use chrono::{DateTime, FixedOffset};
use sqlx::SqlitePool;

const RECORD_COLUMNS: &str = "id, teacher_id, class_id, period_index, scanned_at, scan_date";

/// Record to be inserted by a successful scan.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub teacher_id: i64,
    pub class_id: i64,
    pub period_index: i64,
    pub scanned_at: DateTime<FixedOffset>,
}

pub async fn record_scan(
    db_pool: &SqlitePool,
    clock: &dyn Clock,
    teacher_id: i64,
    request: &ScanRequest,
) -> AppResult<AttendanceRecord> {
    let qr_token = request.qr_token.trim();
    if qr_token.is_empty() {
        return Err(AppError::NotFound(NotFoundKind::InvalidQrToken));
    }
    if request.period_index < 1 {
        return Err(AppError::BadRequest("period_index must be 1 or greater.".into()));
    }

    // 1. class
    let class = class_service::find_class_by_qr_token(db_pool, qr_token)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Scan by teacher {}: unknown QR token", teacher_id);
            AppError::NotFound(NotFoundKind::InvalidQrToken)
        })?;

    // 2. slot for today's weekday
    let now = clock.now();
    let today = DayRange::containing(&now);
    let slot = schedule_service::find_schedule_slot(
        db_pool,
        teacher_id,
        class.id,
        today.weekday_key(),
        request.period_index,
    )
    .await?
    .ok_or_else(|| {
        tracing::warn!(
            "Scan by teacher {}: no lesson in class {} on {} period {}",
            teacher_id,
            class.id,
            today.weekday_key(),
            request.period_index
        );
        AppError::NotFound(NotFoundKind::NoScheduledLesson)
    })?;

    // 3. inclusive time window
    let window = slot.window().ok_or_else(|| {
        tracing::error!(
            "Schedule {} has unparseable times {:?}-{:?}",
            slot.id,
            slot.start_time,
            slot.end_time
        );
        AppError::InternalServerError
    })?;
    let at = time_of_day(&now);
    if !window.contains(at) {
        tracing::warn!(
            "Scan by teacher {}: {} outside {}-{} (schedule {})",
            teacher_id,
            at.format("%H:%M"),
            slot.start_time,
            slot.end_time,
            slot.id
        );
        return Err(AppError::InvalidState(InvalidStateKind::OutsideLessonWindow));
    }

    // 4. one record per (teacher, class, period, day)
    if let Some(existing) =
        find_attendance_record(db_pool, teacher_id, class.id, request.period_index, &today).await?
    {
        tracing::warn!(
            "Scan by teacher {}: already recorded as {} at {}",
            teacher_id,
            existing.id,
            existing.scanned_at
        );
        return Err(AppError::Conflict(ConflictKind::AlreadyScanned));
    }

    // 5. persist
    let record = insert_attendance_record(
        db_pool,
        &NewAttendance {
            teacher_id,
            class_id: class.id,
            period_index: request.period_index,
            scanned_at: now,
        },
    )
    .await?;

    tracing::info!(
        "Attendance {} recorded: teacher={} class={} period={} at {}",
        record.id,
        record.teacher_id,
        record.class_id,
        record.period_index,
        record.scanned_at
    );
    Ok(record)
}

/// Existing record for (teacher, class, period) whose scan time falls inside `day`.
pub async fn find_attendance_record(
    db_pool: &SqlitePool,
    teacher_id: i64,
    class_id: i64,
    period_index: i64,
    day: &DayRange,
) -> AppResult<Option<AttendanceRecord>> {
    let (from, to) = day.storage_bounds();
    let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
        r#"
        SELECT {}
        FROM attendance
        WHERE teacher_id = ?1 AND class_id = ?2 AND period_index = ?3
          AND scanned_at >= ?4 AND scanned_at <= ?5
        LIMIT 1
        "#,
        RECORD_COLUMNS
    ))
    .bind(teacher_id)
    .bind(class_id)
    .bind(period_index)
    .bind(from)
    .bind(to)
    .fetch_optional(db_pool)
    .await?;
    Ok(record)
}

/// Inserts a record. Losing a race against a concurrent scan for the same
/// (teacher, class, period, day) yields `Conflict(AlreadyScanned)`.
pub async fn insert_attendance_record(db_pool: &SqlitePool, new: &NewAttendance) -> AppResult<AttendanceRecord> {
    let scan_date = DayRange::containing(&new.scanned_at).date_key();
    let inserted = sqlx::query_as::<_, AttendanceRecord>(&format!(
        r#"
        INSERT INTO attendance (teacher_id, class_id, period_index, scanned_at, scan_date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING {}
        "#,
        RECORD_COLUMNS
    ))
    .bind(new.teacher_id)
    .bind(new.class_id)
    .bind(new.period_index)
    .bind(to_storage_timestamp(&new.scanned_at))
    .bind(scan_date)
    .fetch_one(db_pool)
    .await;

    match inserted {
        Ok(record) => Ok(record),
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(
                "Concurrent duplicate scan rejected: teacher={} class={} period={}",
                new.teacher_id,
                new.class_id,
                new.period_index
            );
            Err(AppError::Conflict(ConflictKind::AlreadyScanned))
        }
        Err(e) => Err(e.into()),
    }
}

/// A teacher's attendance history, newest first.
pub async fn list_for_teacher(db_pool: &SqlitePool, teacher_id: i64) -> AppResult<Vec<TeacherAttendanceRow>> {
    let rows = sqlx::query_as::<_, TeacherAttendanceRow>(
        r#"
        SELECT a.id, a.class_id, c.name AS class_name, c.grade, c.major,
               a.period_index, a.scanned_at, a.scan_date
        FROM attendance a
        JOIN classes c ON c.id = a.class_id
        WHERE a.teacher_id = ?1
        ORDER BY a.scanned_at DESC
        "#,
    )
    .bind(teacher_id)
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        models::{class::Class, teacher::Teacher},
        services::{
            class_service::{self, sample_class},
            schedule_service::{self, slot_payload},
            teacher_service::{self, sample_payload},
        },
    };

    pub struct Seeded {
        pub teacher: Teacher,
        pub class: Class,
    }

    /// Teacher + class + Monday period 2, 08:00-08:45.
    pub async fn seed_monday_lesson(pool: &SqlitePool) -> Seeded {
        let teacher = teacher_service::create_teacher(pool, None, &sample_payload("budi"))
            .await
            .unwrap();
        let class = class_service::create_class(pool, 1, &sample_class("A")).await.unwrap();
        schedule_service::create_schedule(
            pool,
            1,
            &slot_payload(teacher.id, class.id, "monday", 2, "08:00", "08:45"),
        )
        .await
        .unwrap();
        Seeded { teacher, class }
    }
}
