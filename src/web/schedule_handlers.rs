// src/web/schedule_handlers.rs
use crate::{
    error::{AppError, AppResult, ForbiddenKind},
    models::{
        schedule::{CreateSchedulePayload, ScheduleDetail, ScheduleSlot},
        user::Caller,
    },
    services::schedule_service,
    state::AppState,
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

// GET /api/schedules
pub async fn list_schedules(State(state): State<AppState>) -> AppResult<Json<Vec<ScheduleDetail>>> {
    Ok(Json(schedule_service::list_schedules(&state.db_pool).await?))
}

// GET /api/schedules/teacher/{id} (admin or the teacher themself)
pub async fn list_for_teacher(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(teacher_id): Path<i64>,
) -> AppResult<Json<Vec<ScheduleDetail>>> {
    if !caller.can_view_teacher(teacher_id) {
        return Err(AppError::Forbidden(ForbiddenKind::NotOwner));
    }
    let rows = schedule_service::list_schedules_for_teacher(&state.db_pool, teacher_id).await?;
    Ok(Json(rows))
}

// POST /api/schedules
pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateSchedulePayload>,
) -> AppResult<(StatusCode, Json<ScheduleSlot>)> {
    let slot = schedule_service::create_schedule(&state.db_pool, caller.user_id(), &payload).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

// DELETE /api/schedules/{id}
pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(schedule_id): Path<i64>,
) -> AppResult<Json<Value>> {
    schedule_service::delete_schedule(&state.db_pool, caller.user_id(), schedule_id).await?;
    Ok(Json(json!({ "message": "Schedule deleted." })))
}
