// src/state.rs
use crate::{clock::Clock, config::AppConfig};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<AppConfig>,
    // Source of "now" for scans; tests swap in a fixed clock
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db_pool,
            config: Arc::new(config),
            clock,
        }
    }
}

// Lets handlers extract the pool directly
impl axum::extract::FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.db_pool.clone()
    }
}
