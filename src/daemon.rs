use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::chatlog::{ChatLogEntry, SYSTEM_USER_ID};
use crate::error::{AgentDeskError, Result};
use crate::scheduler::{AgentRunJob, Scheduler};
use crate::services::desk::AgentDesk;

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<AgentDesk>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ChatHistoryQuery {
    user_id: Option<i32>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ChatHistoryResponse {
    history: Vec<ChatLogEntry>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/run-all-agents", post(run_all_agents))
        .route("/chat-history", get(chat_history));

    for id in state.desk.registry().ids() {
        router = router.route(
            &format!("/run-{id}"),
            post(
                move |state: State<AppState>, headers: HeaderMap, body: Json<RunRequest>| {
                    run_agent(state, headers, id, body)
                },
            ),
        );
    }

    let assembler = state.desk.assembler();
    let charts = ServeDir::new(assembler.renderer().output_dir());
    let router = match assembler.url_prefix() {
        "" => router.fallback_service(charts),
        prefix => router.nest_service(prefix, charts),
    };
    router.with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("AGENT_DESK_GIT_SHA").to_string(),
    })
}

async fn run_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    agent_id: &'static str,
    Json(request): Json<RunRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, state.token.as_deref()) {
        return err.into_response();
    }

    match state.desk.run_agent(agent_id, &request.message).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            tracing::warn!(agent = agent_id, error = %err, "Agent run failed");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

async fn run_all_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RunRequest>,
) -> Response {
    if let Err(err) = authorize(&headers, state.token.as_deref()) {
        return err.into_response();
    }

    let results = state.desk.run_all(&request.message).await;
    (StatusCode::OK, Json(results)).into_response()
}

async fn chat_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ChatHistoryQuery>,
) -> Response {
    if let Err(err) = authorize(&headers, state.token.as_deref()) {
        return err.into_response();
    }
    let Some(store) = state.desk.chat_log() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Chat log is not configured");
    };

    let user_id = query.user_id.unwrap_or(SYSTEM_USER_ID);
    let limit = query.limit.unwrap_or(40).clamp(1, 200);
    match store.history(user_id, limit).await {
        Ok(history) => (StatusCode::OK, Json(ChatHistoryResponse { history })).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// No configured token means the API is open.
fn authorize(
    headers: &HeaderMap,
    token: Option<&str>,
) -> std::result::Result<(), (StatusCode, Json<ErrorResponse>)> {
    let expected_token = token.map(str::trim).unwrap_or_default();
    if expected_token.is_empty() {
        return Ok(());
    }

    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("").trim();
    let api_key = api_key.trim();

    if bearer == expected_token || api_key == expected_token {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        ))
    }
}

/// Serves the API until `shutdown` resolves. When `schedule` is set, every
/// agent also runs unattended on that interval.
pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    state: AppState,
    schedule: Option<std::time::Duration>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut scheduler = Scheduler::new();
    if let Some(interval) = schedule {
        for job in AgentRunJob::for_all(&state.desk, interval) {
            scheduler.register_job(Arc::new(job));
        }
        scheduler.start();
    }

    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
    tracing::info!(%addr, "Agent desk listening");
    let shutdown = async move {
        shutdown.await;
        scheduler.stop().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;

    Ok(())
}
