use axum::{
    body::{to_bytes, Body},
    Router,
};
use http::{Request, StatusCode};
use sms_dispatch::config::{AuthConfig, Config};
use sms_dispatch::db::{self, DbKind};
use sms_dispatch::{build_router, AppState, AUTH_HEADER};
use serde_json::{json, Value};
use sqlx::AnyPool;
use tempfile::TempDir;
use tower::ServiceExt;

const TOKEN: &str = "test_token_123";

fn create_test_config() -> Config {
    Config {
        auth: AuthConfig {
            token: Some(TOKEN.to_string()),
        },
        ..Config::default()
    }
}

async fn create_test_app_state() -> (AppState, TempDir) {
    sqlx::any::install_default_drivers();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("api.db");
    let pool = AnyPool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .unwrap();
    db::init_db(&pool, DbKind::Sqlite).await.unwrap();

    let state = AppState::new(create_test_config(), pool, DbKind::Sqlite, reqwest::Client::new());
    (state, temp_dir)
}

fn create_app(state: &AppState) -> Router {
    build_router(state.clone())
}

fn post_json(uri: &str, payload: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTH_HEADER, token);
    }
    builder
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (state, _dir) = create_test_app_state().await;
    let app = create_app(&state);

    let response = app
        .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_status_returns_zero_for_empty_db() {
    let (state, _dir) = create_test_app_state().await;
    let app = create_app(&state);

    let response = app
        .oneshot(Request::builder().uri("/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["total"], 0);
    assert_eq!(value["sent"], 0);
    assert_eq!(value["failed"], 0);
}

#[tokio::test]
async fn test_send_requires_token() {
    let (state, _dir) = create_test_app_state().await;
    let payload = json!({"to": {"phone": "5551234567"}, "message": "hi"});

    let missing = create_app(&state)
        .oneshot(post_json("/v1/sms/send", &payload, None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = create_app(&state)
        .oneshot(post_json("/v1/sms/send", &payload, Some("nope")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_without_providers_returns_failure_result() {
    let (state, _dir) = create_test_app_state().await;
    let payload = json!({
        "to": [{"phone": "5551234567", "organization_id": "org_1"}],
        "message": "Reminder: appointment tomorrow at 9"
    });

    let response = create_app(&state)
        .oneshot(post_json("/v1/sms/send", &payload, Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["success"], false);
    assert_eq!(value["provider"], "twilio");
    assert_eq!(value["error"], "All SMS providers failed");

    let logs = create_app(&state)
        .oneshot(
            Request::builder()
                .uri("/v1/sms/logs?organization_id=org_1")
                .header(AUTH_HEADER, TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(logs.status(), StatusCode::OK);
    let rows = json_body(logs).await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "failed");
    assert_eq!(rows[0]["direction"], "outbound");
}

#[tokio::test]
async fn test_send_template_missing() {
    let (state, _dir) = create_test_app_state().await;
    let payload = json!({
        "template_key": "welcome",
        "to": {"phone": "5551234567"},
        "variables": {"name": "Ana"}
    });

    let response = create_app(&state)
        .oneshot(post_json("/v1/sms/send-template", &payload, Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "Template not found: welcome");
}

#[tokio::test]
async fn test_emergency_broadcast_without_contacts() {
    let (state, _dir) = create_test_app_state().await;
    let payload = json!({"organization_id": "org_1", "message": "Shelter in place"});

    let response = create_app(&state)
        .oneshot(post_json("/v1/sms/emergency-broadcast", &payload, Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"results": []}));
}

#[tokio::test]
async fn test_validate_phone() {
    let (state, _dir) = create_test_app_state().await;
    let payload = json!({"phone": "(555) 123-4567"});

    let response = create_app(&state)
        .oneshot(post_json("/v1/sms/validate", &payload, Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["formatted"], "+15551234567");
    assert_eq!(value["valid"], true);
    assert_eq!(value["phone"], "(555) 123-4567");
}

#[tokio::test]
async fn test_no_token_configured_allows_requests() {
    sqlx::any::install_default_drivers();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("open.db");
    let pool = AnyPool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .unwrap();
    db::init_db(&pool, DbKind::Sqlite).await.unwrap();
    let state = AppState::new(Config::default(), pool, DbKind::Sqlite, reqwest::Client::new());

    let response = create_app(&state)
        .oneshot(post_json("/v1/sms/validate", &json!({"phone": "123"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["valid"], false);
}
