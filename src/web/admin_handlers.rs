// src/web/admin_handlers.rs
use crate::{
    db,
    error::AppResult,
    models::{audit::AuditEntry, user::{Caller, UserSummary}},
    services::{audit_service, user_service},
    state::AppState,
};
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

// GET /api/users
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserSummary>>> {
    Ok(Json(user_service::list_users(&state.db_pool).await?))
}

// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Value>> {
    user_service::delete_user(&state.db_pool, caller.user_id(), user_id).await?;
    Ok(Json(json!({ "message": "User deleted." })))
}

// GET /api/audit-log
pub async fn audit_log(State(state): State<AppState>) -> AppResult<Json<Vec<AuditEntry>>> {
    Ok(Json(audit_service::list_recent(&state.db_pool).await?))
}

// GET /health
pub async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    db::ping(&state.db_pool).await?;
    Ok(Json(json!({
        "status": "ok",
        "school_utc_offset": state.config.utc_offset.to_string(),
    })))
}
