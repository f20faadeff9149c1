pub mod communication_log;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod phone;
pub mod providers;
pub mod registry;
pub mod template;
pub mod types;

pub use config::Config;
pub use dispatcher::Dispatcher;

use self::config::{load_config, resolve_database_url};
use self::db::DbKind;
use self::types::{ProviderName, SendRequest, SendResult, TemplateSendRequest};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::AnyPool;
use tracing::error;

pub const AUTH_HEADER: &str = "X-Sms-Dispatch-Token";

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: AnyPool,
    pub db_kind: DbKind,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, pool: AnyPool, db_kind: DbKind, http: reqwest::Client) -> Self {
        let dispatcher = Dispatcher::new(pool.clone(), db_kind, config.clone(), http);
        Self {
            config,
            pool,
            db_kind,
            dispatcher,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendSmsBody {
    #[serde(flatten)]
    pub request: SendRequest,
    pub preferred_provider: Option<ProviderName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyBroadcastBody {
    pub organization_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub results: Vec<SendResult>,
}

#[derive(Debug, Deserialize)]
pub struct ValidatePhoneBody {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct ValidatePhoneResponse {
    pub phone: String,
    pub formatted: String,
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub organization_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_app() -> anyhow::Result<(AppState, Router)> {
    sqlx::any::install_default_drivers();

    let config = load_config();
    let db_url = resolve_database_url(&config);
    let db_kind = db::db_kind_from_url(&db_url);
    let pool = AnyPool::connect(&db_url).await?;
    db::init_db(&pool, db_kind).await?;

    let state = AppState::new(config, pool, db_kind, reqwest::Client::new());
    let app = build_router(state.clone());
    Ok((state, app))
}

pub fn build_router(state: AppState) -> Router {
    let authed_routes = Router::new()
        .route("/v1/sms/send", post(send_sms))
        .route("/v1/sms/send-template", post(send_template_sms))
        .route("/v1/sms/emergency-broadcast", post(emergency_broadcast))
        .route("/v1/sms/logs", get(list_logs))
        .route("/v1/sms/validate", post(validate_phone))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let public_routes = Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status));

    Router::new()
        .merge(authed_routes)
        .merge(public_routes)
        .with_state(state)
}

async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> impl IntoResponse {
    if let Some(token) = state.config.auth.token.as_ref() {
        let header = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok());
        if header != Some(token.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(req).await
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let counts = db::count_communication_logs(&state.pool)
        .await
        .unwrap_or_default();
    Json(counts)
}

async fn send_sms(State(state): State<AppState>, Json(body): Json<SendSmsBody>) -> impl IntoResponse {
    let result = state
        .dispatcher
        .send_sms(body.request, body.preferred_provider)
        .await;
    Json(result)
}

async fn send_template_sms(
    State(state): State<AppState>,
    Json(body): Json<TemplateSendRequest>,
) -> impl IntoResponse {
    Json(state.dispatcher.send_template_sms(body).await)
}

async fn emergency_broadcast(
    State(state): State<AppState>,
    Json(body): Json<EmergencyBroadcastBody>,
) -> impl IntoResponse {
    match state
        .dispatcher
        .send_emergency_broadcast(&body.organization_id, &body.message)
        .await
    {
        Ok(results) => Json(BroadcastResponse { results }).into_response(),
        Err(err) => {
            error!("emergency broadcast error: {err:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

async fn list_logs(State(state): State<AppState>, Query(query): Query<LogQuery>) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    match db::list_communication_logs(
        &state.pool,
        state.db_kind,
        query.organization_id.as_deref(),
        limit,
        offset,
    )
    .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => {
            error!("list sms logs error: {err:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

async fn validate_phone(Json(body): Json<ValidatePhoneBody>) -> impl IntoResponse {
    Json(ValidatePhoneResponse {
        formatted: phone::format_phone_number(&body.phone),
        valid: phone::validate_phone_number(&body.phone),
        phone: body.phone,
    })
}
