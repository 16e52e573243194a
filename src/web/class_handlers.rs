// src/web/class_handlers.rs
use crate::{
    error::{AppError, AppResult, NotFoundKind},
    models::{
        class::{Class, ClassQrPayload, CreateClassPayload},
        user::Caller,
    },
    services::class_service,
    state::AppState,
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

// GET /api/classes
pub async fn list_classes(State(state): State<AppState>) -> AppResult<Json<Vec<Class>>> {
    Ok(Json(class_service::list_classes(&state.db_pool).await?))
}

// POST /api/classes
pub async fn create_class(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateClassPayload>,
) -> AppResult<(StatusCode, Json<Class>)> {
    let class = class_service::create_class(&state.db_pool, caller.user_id(), &payload).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

// DELETE /api/classes/{id}
pub async fn delete_class(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(class_id): Path<i64>,
) -> AppResult<Json<Value>> {
    class_service::delete_class(&state.db_pool, caller.user_id(), class_id).await?;
    Ok(Json(json!({ "message": "Class deleted." })))
}

// GET /api/classes/{id}/qr
// The token is what the QR code encodes; the SVG is ready to print.
pub async fn class_qr(State(state): State<AppState>, Path(class_id): Path<i64>) -> AppResult<Json<ClassQrPayload>> {
    let class = class_service::find_class_by_id(&state.db_pool, class_id)
        .await?
        .ok_or(AppError::NotFound(NotFoundKind::Class))?;
    let qr_image = class_service::render_qr_svg(&class.qr_token)?;
    Ok(Json(ClassQrPayload {
        qr_payload: class.qr_token.clone(),
        qr_image,
        class,
    }))
}
