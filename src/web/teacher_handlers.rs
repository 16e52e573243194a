// src/web/teacher_handlers.rs
use crate::{
    error::AppResult,
    models::{
        teacher::{CreateTeacherPayload, Teacher, TeacherWithAccount},
        user::Caller,
    },
    services::teacher_service,
    state::AppState,
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

// GET /api/teachers
pub async fn list_teachers(State(state): State<AppState>) -> AppResult<Json<Vec<TeacherWithAccount>>> {
    let teachers = teacher_service::list_teachers(&state.db_pool).await?;
    Ok(Json(teachers))
}

// POST /api/teachers
pub async fn create_teacher(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateTeacherPayload>,
) -> AppResult<(StatusCode, Json<Teacher>)> {
    let teacher = teacher_service::create_teacher(&state.db_pool, Some(caller.user_id()), &payload).await?;
    Ok((StatusCode::CREATED, Json(teacher)))
}

// DELETE /api/teachers/{id}
pub async fn delete_teacher(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(teacher_id): Path<i64>,
) -> AppResult<Json<Value>> {
    teacher_service::delete_teacher(&state.db_pool, caller.user_id(), teacher_id).await?;
    Ok(Json(json!({ "message": "Teacher deleted." })))
}

// POST /api/teachers/{id}/reset-device
pub async fn reset_device(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(teacher_id): Path<i64>,
) -> AppResult<Json<Value>> {
    teacher_service::reset_device(&state.db_pool, caller.user_id(), teacher_id).await?;
    Ok(Json(json!({ "message": "Device binding reset. The next login binds a new device." })))
}
