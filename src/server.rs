//! Chat HTTP server.
//!
//! Exposes the conversation and query pipeline as a JSON API so a browser
//! or desktop front end can drive the same turn controller the CLI uses.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Run one turn for a user message |
//! | `GET`  | `/history` | Full conversation and selected model |
//! | `POST` | `/reset` | Clear the conversation |
//! | `GET`  | `/models` | Configured semantic models |
//! | `POST` | `/model` | Select a semantic model (resets the session) |
//! | `POST` | `/query` | Execute raw SQL through the memoizing executor |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `sql_error` (400), `internal` (500).
//!
//! The session lives behind an async mutex: one turn runs to completion
//! before the next is admitted, which preserves the single-writer ordering
//! guarantee of the cooperative model.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::controller::TurnController;
use crate::executor::QueryExecutor;
use crate::models::Turn;
use crate::session::Session;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    controller: Arc<TurnController>,
    executor: Arc<QueryExecutor>,
    available_models: Arc<Vec<String>>,
}

/// Starts the chat API server on the configured bind address. Runs until
/// the process is terminated.
pub async fn run_server(
    config: &Config,
    controller: TurnController,
    executor: QueryExecutor,
) -> anyhow::Result<()> {
    let state = AppState {
        session: Arc::new(Mutex::new(Session::new(config.models.default_model()))),
        controller: Arc::new(controller),
        executor: Arc::new(executor),
        available_models: Arc::new(config.models.available.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "serving chat API");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/history", get(history))
        .route("/reset", post(reset))
        .route("/models", get(models))
        .route("/model", post(select_model))
        .route("/query", post(query))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    turn: Turn,
    api_error: bool,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "message must not be empty");
    }

    let mut session = state.session.lock().await;
    state.controller.process_input(&mut session, &req.message).await;

    let Some(turn) = session.last_turn().cloned() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", "turn was not recorded");
    };
    let api_error = session.take_api_error_notice();

    Json(ChatResponse { turn, api_error }).into_response()
}

#[derive(Serialize)]
struct HistoryResponse {
    selected_model: String,
    messages: Vec<Turn>,
}

async fn history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse {
        selected_model: session.selected_model().to_string(),
        messages: session.messages().to_vec(),
    })
}

async fn reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.session.lock().await.reset();
    Json(serde_json::json!({ "status": "ok" }))
}

async fn models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session = state.session.lock().await;
    Json(serde_json::json!({
        "available": *state.available_models,
        "selected": session.selected_model(),
    }))
}

#[derive(Deserialize)]
struct SelectModelRequest {
    model: String,
}

async fn select_model(
    State(state): State<AppState>,
    Json(req): Json<SelectModelRequest>,
) -> Response {
    if !state.available_models.contains(&req.model) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            &format!("model is not in the configured list: {}", req.model),
        );
    }

    let mut session = state.session.lock().await;
    session.select_model(&req.model);
    Json(serde_json::json!({ "status": "ok", "selected": req.model })).into_response()
}

#[derive(Deserialize)]
struct QueryRequest {
    statement: String,
}

async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Response {
    match state.executor.execute(&req.statement).await {
        Ok(table) => Json((*table).clone()).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, "sql_error", &err.user_message()),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": { "code": code, "message": message }
        })),
    )
        .into_response()
}
