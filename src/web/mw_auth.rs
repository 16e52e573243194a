// src/web/mw_auth.rs
use crate::{error::AppError, services::auth_service, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

pub const SESSION_USER_KEY: &str = "user_id";

/// Requires a logged-in session and resolves it into a `Caller` extension.
/// A session whose account no longer exists is treated as logged out.
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = match session.get::<i64>(SESSION_USER_KEY).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::debug!("Auth MW: no user_id in session");
            return Err(AppError::Unauthorized);
        }
        Err(e) => {
            tracing::error!("Auth MW: failed to read session: {:?}", e);
            return Err(AppError::SessionError(format!("Failed to read session: {}", e)));
        }
    };

    let Some(caller) = auth_service::resolve_caller(&state.db_pool, user_id).await? else {
        tracing::warn!("Auth MW: session user {} no longer resolves, flushing", user_id);
        if let Err(e) = session.flush().await {
            tracing::error!("Auth MW: failed to flush stale session: {:?}", e);
        }
        return Err(AppError::Unauthorized);
    };

    tracing::debug!("Auth MW: user {} authenticated", caller.user_id());
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
