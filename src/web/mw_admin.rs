// src/web/mw_admin.rs
use crate::{
    error::{AppError, ForbiddenKind},
    models::user::Caller,
};
use axum::{extract::Request, middleware::Next, response::Response};

/// Lets only admins through. Must run after `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<Caller>()
        .ok_or(AppError::Unauthorized)?;

    if !caller.is_admin() {
        tracing::warn!("Admin MW: access denied for user {}", caller.user_id());
        return Err(AppError::Forbidden(ForbiddenKind::AdminOnly));
    }
    Ok(next.run(request).await)
}
