mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{Harness, CIRCULAR_REPLY};
use novacite_api::{build_router, ApiConfig, ApiState};
use serde_json::json;
use tower::ServiceExt;

const API_KEY: &str = "test-novacite-key";

fn config(rate_limit_max: usize) -> ApiConfig {
    ApiConfig {
        api_key: API_KEY.to_string(),
        bind: "127.0.0.1:0".to_string(),
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max,
    }
}

fn app(harness: &Harness, rate_limit_max: usize) -> Router {
    build_router(ApiState::new(harness.assistant(), &config(rate_limit_max)))
}

fn chat_request(query: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let harness = Harness::classifying_as("identity");
    let response = app(&harness, 10)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["metrics"]["requests_total"], 0);
}

#[tokio::test]
async fn chat_requires_api_key() {
    let harness = Harness::classifying_as("identity");
    let response = app(&harness, 10)
        .oneshot(chat_request("Who are you?", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(harness.classifier_llm.prompts.lock().is_empty());
}

#[tokio::test]
async fn chat_returns_intent_and_result() {
    let harness = Harness::classifying_as("pdf_request");
    let response = app(&harness, 10)
        .oneshot(chat_request("Show me exam timetable PDFs", Some(API_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["intent"], "pdf_request");
    assert_eq!(body["result"], CIRCULAR_REPLY);
    assert!(!body["request_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn collaborator_failure_is_bad_gateway() {
    let mut harness = Harness::classifying_as("faculty_info");
    harness.faculty = common::RecordingCollaborator::failing();

    let response = app(&harness, 10)
        .oneshot(chat_request("Who heads physics?", Some(API_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "assistant_failed");
    assert!(!body["message"].as_str().unwrap().contains("faculty index"));
}

#[tokio::test]
async fn chat_is_rate_limited_per_client() {
    let harness = Harness::classifying_as("unknown");
    let app = app(&harness, 2);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(chat_request("hello", Some(API_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(chat_request("hello", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}
