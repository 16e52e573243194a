// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{Caller, ChangePasswordPayload, LoginPayload},
    services::{auth_service, teacher_service},
    state::AppState,
    web::mw_auth::SESSION_USER_KEY,
};
use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use tower_sessions::Session;

// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> AppResult<Json<Value>> {
    tracing::info!("Login attempt for '{}'", payload.username);

    let outcome = auth_service::login(
        &state.db_pool,
        &payload.username,
        &payload.password,
        payload.device_id.as_deref(),
    )
    .await?;

    // New session id on every login
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to cycle session id: {}", e)))?;
    session
        .insert(SESSION_USER_KEY, outcome.user.id)
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to store session: {}", e)))?;

    tracing::info!("✅ Login succeeded for '{}'", outcome.user.username);
    Ok(Json(json!({
        "user": {
            "id": outcome.user.id,
            "username": outcome.user.username,
            "role": outcome.user.role,
            "device_id": outcome.user.device_id,
        },
        "teacher": outcome.teacher,
    })))
}

// POST /api/auth/logout
pub async fn handle_logout(session: Session) -> AppResult<Json<Value>> {
    let user_id: Option<i64> = match session.get(SESSION_USER_KEY).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Logout: failed to read session: {:?}", e);
            None
        }
    };

    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Failed to delete session: {}", e)))?;

    match user_id {
        Some(id) => tracing::info!("🚪 User {} logged out.", id),
        None => tracing::info!("🚪 Anonymous session logged out."),
    }
    Ok(Json(json!({ "message": "Logged out." })))
}

// GET /api/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> AppResult<Json<Value>> {
    let teacher = match caller.teacher_id() {
        Some(id) => teacher_service::find_teacher_by_id(&state.db_pool, id).await?,
        None => None,
    };
    Ok(Json(json!({ "user": caller, "teacher": teacher })))
}

// POST /api/auth/change-password
pub async fn handle_change_password(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<ChangePasswordPayload>,
) -> AppResult<Json<Value>> {
    auth_service::change_password(
        &state.db_pool,
        caller.user_id(),
        &payload.old_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(json!({ "message": "Password changed." })))
}
