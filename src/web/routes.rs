// src/web/routes.rs
use crate::{
    config::SessionConfig,
    state::AppState,
    web::{
        admin_handlers, attendance_handlers, auth_handlers, class_handlers, mw_admin, mw_auth, schedule_handlers,
        teacher_handlers,
    },
};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

pub fn create_router(app_state: AppState) -> Router {
    // --- Public ---
    let public_routes = Router::new()
        .route("/health", get(admin_handlers::health))
        .route("/api/auth/login", post(auth_handlers::handle_login))
        .route("/api/auth/logout", post(auth_handlers::handle_logout));

    // --- Admin only ---
    let admin_routes = Router::new()
        .route(
            "/api/teachers",
            get(teacher_handlers::list_teachers).post(teacher_handlers::create_teacher),
        )
        .route("/api/teachers/{id}", delete(teacher_handlers::delete_teacher))
        .route("/api/teachers/{id}/reset-device", post(teacher_handlers::reset_device))
        .route(
            "/api/classes",
            get(class_handlers::list_classes).post(class_handlers::create_class),
        )
        .route("/api/classes/{id}", delete(class_handlers::delete_class))
        .route("/api/classes/{id}/qr", get(class_handlers::class_qr))
        .route(
            "/api/schedules",
            get(schedule_handlers::list_schedules).post(schedule_handlers::create_schedule),
        )
        .route("/api/schedules/{id}", delete(schedule_handlers::delete_schedule))
        .route("/api/users", get(admin_handlers::list_users))
        .route("/api/users/{id}", delete(admin_handlers::delete_user))
        .route("/api/audit-log", get(admin_handlers::audit_log))
        .route("/api/reports/attendance", get(attendance_handlers::attendance_report))
        // mw_auth wraps this from the parent router
        .route_layer(middleware::from_fn(mw_admin::require_admin));

    // --- Any logged-in caller ---
    let authenticated_routes = Router::new()
        .route("/api/auth/me", get(auth_handlers::handle_me))
        .route("/api/auth/change-password", post(auth_handlers::handle_change_password))
        .route("/api/attendance/scan", post(attendance_handlers::handle_scan))
        .route("/api/attendance/teacher/{id}", get(attendance_handlers::teacher_history))
        .route("/api/schedules/teacher/{id}", get(schedule_handlers::list_for_teacher))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(app_state.clone(), mw_auth::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .with_state(app_state)
}

/// Cookie-backed session layer over the SQLite session store.
pub fn session_layer(store: SqliteStore, config: &SessionConfig) -> SessionManagerLayer<SqliteStore> {
    SessionManagerLayer::new(store)
        .with_secure(config.secure_cookie)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.inactivity_days)))
}

/// Router plus the request-wide layers (tracing, sessions).
pub fn create_app(app_state: AppState, sessions: SessionManagerLayer<SqliteStore>) -> Router {
    create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(sessions),
    )
}

#[cfg(test)]
mod router_tests {
    use super::*;
    use crate::{
        clock::{local, FixedClock},
        config::{offset_from_minutes, AppConfig},
        db::test_pool,
        services::{attendance_service::test_support::seed_monday_lesson, user_service},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        qr_token: String,
        teacher_id: i64,
    }

    /// Seeded database, Monday 2025-01-06 08:15 local, admin "admin".
    async fn test_app() -> TestApp {
        let pool = test_pool().await;
        let seeded = seed_monday_lesson(&pool).await;
        user_service::create_admin(&pool, "admin", "adminpass").await;

        let session_config = SessionConfig {
            secure_cookie: false,
            inactivity_days: 1,
        };
        let config = AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 0,
            utc_offset: offset_from_minutes(420).unwrap(),
            session: session_config.clone(),
            bootstrap_admin: None,
        };

        let store = SqliteStore::new(pool.clone()).with_table_name("sessions").unwrap();
        store.migrate().await.unwrap();

        let clock = Arc::new(FixedClock(local(420, 2025, 1, 6, 8, 15)));
        let state = AppState::new(pool, config, clock);
        TestApp {
            router: create_app(state, session_layer(store, &session_config)),
            qr_token: seeded.class.qr_token,
            teacher_id: seeded.teacher.id,
        }
    }

    async fn send(app: &TestApp, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Logs in and returns the `name=value` part of the session cookie.
    async fn login(app: &TestApp, body: Value) -> String {
        let response = send(app, "POST", "/api/auth/login", None, Some(body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login sets a session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn teacher_cookie(app: &TestApp) -> String {
        login(app, json!({ "username": "budi", "password": "rahasia1", "device_id": "phone-1" })).await
    }

    async fn admin_cookie(app: &TestApp) -> String {
        login(app, json!({ "username": "admin", "password": "adminpass" })).await
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app().await;
        let response = send(&app, "GET", "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        let app = test_app().await;
        let response = send(&app, "GET", "/api/auth/me", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn teacher_scans_once_per_lesson() {
        let app = test_app().await;
        let cookie = teacher_cookie(&app).await;
        let scan = json!({ "qrToken": app.qr_token, "periodIndex": 2 });

        let first = send(&app, "POST", "/api/attendance/scan", Some(&cookie), Some(scan.clone())).await;
        assert_eq!(first.status(), StatusCode::OK);
        let record = json_body(first).await;
        assert_eq!(record["teacher_id"], app.teacher_id);
        assert_eq!(record["scan_date"], "2025-01-06");

        let second = send(&app, "POST", "/api/attendance/scan", Some(&cookie), Some(scan)).await;
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(second).await["error"], "already_scanned");

        let history = send(
            &app,
            "GET",
            &format!("/api/attendance/teacher/{}", app.teacher_id),
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(history.status(), StatusCode::OK);
        assert_eq!(json_body(history).await.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let app = test_app().await;
        let cookie = teacher_cookie(&app).await;
        let scan = json!({ "qr_token": "nope", "period_index": 2 });
        let response = send(&app, "POST", "/api/attendance/scan", Some(&cookie), Some(scan)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "invalid_qr_token");
    }

    #[tokio::test]
    async fn admins_cannot_scan_and_teachers_cannot_administer() {
        let app = test_app().await;

        let admin = admin_cookie(&app).await;
        let scan = json!({ "qr_token": app.qr_token, "period_index": 2 });
        let response = send(&app, "POST", "/api/attendance/scan", Some(&admin), Some(scan)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "teacher_only");

        let teacher = teacher_cookie(&app).await;
        let response = send(&app, "GET", "/api/teachers", Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "admin_only");

        let other = format!("/api/schedules/teacher/{}", app.teacher_id + 1);
        let response = send(&app, "GET", &other, Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn second_device_is_refused() {
        let app = test_app().await;
        teacher_cookie(&app).await;
        let body = json!({ "username": "budi", "password": "rahasia1", "device_id": "phone-2" });
        let response = send(&app, "POST", "/api/auth/login", None, Some(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "device_mismatch");
    }

    #[tokio::test]
    async fn admin_downloads_csv_report() {
        let app = test_app().await;
        let teacher = teacher_cookie(&app).await;
        let scan = json!({ "qr_token": app.qr_token, "period_index": 2 });
        send(&app, "POST", "/api/attendance/scan", Some(&teacher), Some(scan)).await;

        let admin = admin_cookie(&app).await;
        let response = send(
            &app,
            "GET",
            "/api/reports/attendance?date=2025-01-06&format=csv",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/csv"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn admin_downloads_pdf_report() {
        let app = test_app().await;
        let teacher = teacher_cookie(&app).await;
        let scan = json!({ "qr_token": app.qr_token, "period_index": 2 });
        send(&app, "POST", "/api/attendance/scan", Some(&teacher), Some(scan)).await;

        let admin = admin_cookie(&app).await;
        let response = send(&app, "GET", "/api/reports/attendance?format=pdf", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn class_qr_carries_a_rendered_image() {
        let app = test_app().await;
        let admin = admin_cookie(&app).await;
        let classes = json_body(send(&app, "GET", "/api/classes", Some(&admin), None).await).await;
        let class_id = classes[0]["id"].as_i64().unwrap();

        let response = send(&app, "GET", &format!("/api/classes/{}/qr", class_id), Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["qr_payload"], app.qr_token);
        assert!(body["qr_image"].as_str().unwrap().contains("<svg"));
    }

    #[tokio::test]
    async fn class_with_attendance_cannot_be_deleted() {
        let app = test_app().await;
        let teacher = teacher_cookie(&app).await;
        let scan = json!({ "qr_token": app.qr_token, "period_index": 2 });
        send(&app, "POST", "/api/attendance/scan", Some(&teacher), Some(scan)).await;

        let admin = admin_cookie(&app).await;
        let classes = json_body(send(&app, "GET", "/api/classes", Some(&admin), None).await).await;
        let class_id = classes[0]["id"].as_i64().unwrap();
        let response = send(&app, "DELETE", &format!("/api/classes/{}", class_id), Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"], "has_attendance");

        let response = send(&app, "DELETE", &format!("/api/teachers/{}", app.teacher_id), Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn logout_without_a_session_still_succeeds() {
        let app = test_app().await;
        let response = send(&app, "POST", "/api/auth/logout", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let app = test_app().await;
        let cookie = admin_cookie(&app).await;
        let me = send(&app, "GET", "/api/auth/me", Some(&cookie), None).await;
        assert_eq!(json_body(me).await["user"]["role"], "admin");

        send(&app, "POST", "/api/auth/logout", Some(&cookie), None).await;
        let me = send(&app, "GET", "/api/auth/me", Some(&cookie), None).await;
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    }
}
