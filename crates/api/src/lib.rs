mod rate_limit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use novacite_agents::{Assistant, AssistantRuntime};
use novacite_core::Intent;
use novacite_observability::{AppMetrics, MetricsSnapshot};
use novacite_scrape::ListOnlySelector;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

pub use crate::rate_limit::IpRateLimiter;

const MAX_BODY_BYTES: usize = 16 * 1024;
const FAILURE_MESSAGE: &str = "Sorry, something went wrong while answering. Please try again.";

/// HTTP-only knobs, read from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub bind: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("NOVACITE_API_KEY")
                .unwrap_or_else(|_| "dev-novacite-key".to_string()),
            bind: env::var("NOVACITE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            rate_limit_window: Duration::from_secs(
                env::var("NOVACITE_RATE_LIMIT_WINDOW_SECONDS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60),
            ),
            rate_limit_max: env::var("NOVACITE_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(30),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<Assistant>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
}

impl ApiState {
    pub fn new(assistant: Assistant, config: &ApiConfig) -> Self {
        Self {
            metrics: assistant.metrics().clone(),
            assistant: Arc::new(assistant),
            api_key: config.api_key.clone(),
            limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub request_id: String,
    pub intent: Intent,
    pub result: String,
}

/// Circular choices cannot be asked interactively over HTTP, so the desk lists
/// matches with their links instead.
pub async fn build_app(runtime: &AssistantRuntime, config: &ApiConfig) -> Result<Router> {
    let assistant = runtime
        .assistant(Arc::new(ListOnlySelector), AppMetrics::shared())
        .await?;
    Ok(build_router(ApiState::new(assistant, config)))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Response {
    let request_id = headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match state.assistant.respond(&body.query).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(ChatResponse {
                request_id,
                intent: reply.intent,
                result: reply.result,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(request_id = %request_id, error = %err, "chat request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "assistant_failed",
                    "message": FAILURE_MESSAGE,
                    "request_id": request_id,
                })),
            )
                .into_response()
        }
    }
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if header_key == state.api_key {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": "missing or invalid x-api-key"
        })),
    )
        .into_response()
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    match state.limiter.check(&ip) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limited",
                    "message": "rate limit exceeded for this IP"
                })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}
