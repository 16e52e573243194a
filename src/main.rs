// src/main.rs

// --- Modules ---
mod clock;
mod config;
mod db;
mod error;
mod models;
mod services;
mod state;
mod web;

// --- Imports ---
use crate::{clock::SystemClock, config::AppConfig, services::user_service, state::AppState};
use axum::serve;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Logging ---
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "absensi=debug,tower_http=info,sqlx=warn,tower_sessions=info".into()
        }))
        .with(fmt::layer())
        .init();

    tracing::info!("🚀 Starting attendance server...");

    // --- Configuration ---
    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("❌ Invalid configuration: {}", e);
        anyhow::anyhow!("Invalid configuration: {}", e)
    })?;
    tracing::info!("🕒 School time zone: UTC{}", config.utc_offset);

    // --- Database ---
    let db_pool = match db::create_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Failed to initialise the database: {}", e);
            return Err(anyhow::anyhow!("Failed to connect/migrate DB: {}", e));
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        if user_service::ensure_bootstrap_admin(&db_pool, admin).await? {
            tracing::info!("👤 Bootstrap admin '{}' is ready.", admin.username);
        }
    }

    // --- Sessions ---
    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Failed to create session store: {}", e))?;
    session_store.migrate().await?;

    let cleanup_store = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = cleanup_store
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Session cleanup task failed: {:?}", e);
        }
    });
    tracing::info!("🧹 Session cleanup task started.");

    let session_layer = web::routes::session_layer(session_store, &config.session);
    tracing::info!("🔑 Session layer configured.");

    // --- Listener ---
    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ Failed to bind {}: {}", addr, e);
            return Err(e.into());
        }
    };
    tracing::info!("📡 Listening on http://{}", addr);

    // --- Router ---
    let clock = Arc::new(SystemClock::new(config.utc_offset));
    let app_state = AppState::new(db_pool, config, clock);
    let app = web::routes::create_app(app_state, session_layer);
    tracing::info!("✅ Router and middleware configured.");

    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("❌ Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
