// src/web/attendance_handlers.rs
use crate::{
    error::{AppError, AppResult, ForbiddenKind},
    models::{
        attendance::{AttendanceRecord, ReportFilter, ReportFormat, ScanRequest, TeacherAttendanceRow},
        user::Caller,
    },
    services::{attendance_service, report_service},
    state::AppState,
};
use axum::{
    extract::{Extension, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

// POST /api/attendance/scan
pub async fn handle_scan(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<ScanRequest>,
) -> AppResult<Json<AttendanceRecord>> {
    let Some(teacher_id) = caller.teacher_id() else {
        tracing::warn!("Scan attempted by non-teacher user {}", caller.user_id());
        return Err(AppError::Forbidden(ForbiddenKind::TeacherOnly));
    };

    let record = attendance_service::record_scan(&state.db_pool, state.clock.as_ref(), teacher_id, &request).await?;
    Ok(Json(record))
}

// GET /api/attendance/teacher/{id}
pub async fn teacher_history(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(teacher_id): Path<i64>,
) -> AppResult<Json<Vec<TeacherAttendanceRow>>> {
    if !caller.can_view_teacher(teacher_id) {
        return Err(AppError::Forbidden(ForbiddenKind::NotOwner));
    }
    let rows = attendance_service::list_for_teacher(&state.db_pool, teacher_id).await?;
    Ok(Json(rows))
}

// GET /api/reports/attendance?date=&teacher_id=&class_id=&period_index=&format=json|csv|pdf
pub async fn attendance_report(
    State(state): State<AppState>,
    Query(filter): Query<ReportFilter>,
) -> AppResult<Response> {
    let rows = report_service::attendance_report(&state.db_pool, &filter).await?;

    match filter.format {
        ReportFormat::Json => Ok(Json(rows).into_response()),
        ReportFormat::Csv => {
            let body = report_service::to_csv(&rows)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"attendance_report.csv\"",
                    ),
                ],
                body,
            )
                .into_response())
        }
        ReportFormat::Pdf => {
            let body = report_service::to_pdf(&rows, &filter)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "application/pdf"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"attendance_report.pdf\"",
                    ),
                ],
                body,
            )
                .into_response())
        }
    }
}
