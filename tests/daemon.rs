mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use agent_desk::daemon::{build_router, AppState};
use agent_desk::interfaces::providers::LlmProvider;

use common::{make_desk, PersonaLlmProvider, CALM_REPLY};

async fn make_app(
    dir: &TempDir,
    provider: Arc<dyn LlmProvider>,
    with_db: bool,
    token: Option<&str>,
) -> Router {
    let desk = make_desk(dir, provider, with_db).await;
    build_router(AppState {
        desk,
        token: token.map(str::to_string),
    })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn desk_provider() -> Arc<PersonaLlmProvider> {
    Arc::new(
        PersonaLlmProvider::new()
            .reply("AtlasFX", CALM_REPLY)
            .reply("CryptoNova", "BTC steady.")
            .fail("MaxMentor", "Chat completion failed (500 Internal Server Error): boom"),
    )
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, None).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn run_agent_returns_chart_urls_that_are_served() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, None).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/run-atlasfx",
            json!({"message": "What's the FX summary for USD/JPY?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["summary"], "All calm.");
    let urls = body["chart_urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    let url = urls[0].as_str().unwrap();
    assert!(url.starts_with("/charts/USDJPY_Sim_"));
    assert_eq!(body["chart_imgs"].as_array().unwrap().len(), 1);

    let chart = app.oneshot(get(url)).await.unwrap();
    assert_eq!(chart.status(), StatusCode::OK);
    let bytes = chart.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("<svg"));
}

#[tokio::test]
async fn failing_agent_returns_bad_gateway() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, None).await;

    let response = app
        .oneshot(post_json("/run-maxmentor", json!({"message": "teach me"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn run_all_agents_reports_every_persona() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, None).await;

    let response = app
        .oneshot(post_json("/run-all-agents", json!({"message": "update"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let results = body.as_object().unwrap();
    assert_eq!(results.len(), 5);
    assert!(results["MaxMentor"]["error"].is_string());
    assert_eq!(results["CryptoNova"]["summary"], "BTC steady.");
    assert_eq!(results["JaneMacro"]["summary"], "No news.");
    assert_eq!(
        results["AtlasFX"]["chart_urls"].as_array().unwrap().len(),
        1
    );
    let failures = results.values().filter(|v| v.get("error").is_some()).count();
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn token_guards_run_routes_but_not_health() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, Some("secret")).await;

    let response = app
        .clone()
        .oneshot(post_json("/run-cryptonova", json!({"message": "crypto?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/run-cryptonova", json!({"message": "crypto?"}));
    request
        .headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut request = post_json("/run-all-agents", json!({"message": "update"}));
    request
        .headers_mut()
        .insert("x-api-key", "secret".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_history_needs_a_store() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, None).await;
    let response = app.oneshot(get("/chat-history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn chat_history_lists_logged_runs() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), true, None).await;

    let response = app
        .clone()
        .oneshot(post_json("/run-cryptonova", json!({"message": "crypto?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/chat-history?limit=10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["message"], "BTC steady.");
    assert_eq!(history[0]["is_ai_response"], true);
    assert_eq!(history[1]["message"], "crypto?");
}

#[tokio::test]
async fn unknown_agent_route_is_not_found() {
    let dir = tempdir().unwrap();
    let app = make_app(&dir, desk_provider(), false, None).await;
    let response = app
        .oneshot(post_json("/run-nobody", json!({"message": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
