//! m3 batch server.
//!
//! Exposes one [`BatchEngine`] over HTTP:
//!
//! - `POST /m3Batch` runs a read-only batch
//! - `POST /m3BatchPrivileged` runs a batch that may edit models
//! - `GET  /health` reports server status
//!
//! Request bodies are `{"uid", "intention", "packetId", "requests"}`; the
//! response is always a batch response, with `messageType = error` for
//! failed batches. Privileged batches run one at a time so that a model
//! never has two writers.
//!
//! Configuration: `M3_CONFIG` (TOML file), `M3_SERVER_BIND`,
//! `M3_SERVER_PORT`.
//!
//! Build and run: `cargo run --features server --bin m3-server`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use m3_engine::config::EngineConfig;
use m3_engine::engine::BatchEngine;
use m3_engine::request::BatchRequest;
use m3_engine::response::BatchResponse;

// ── Server state ──────────────────────────────────────────────────────────

struct ServerState {
    engine: Arc<BatchEngine>,
    writer: Mutex<()>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    models: usize,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let models = state
        .engine
        .model_ids()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .len();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models,
    }))
}

async fn run_batch(
    engine: Arc<BatchEngine>,
    request: BatchRequest,
    privileged: bool,
) -> Result<Json<BatchResponse>, (StatusCode, String)> {
    tokio::task::spawn_blocking(move || engine.handle(&request, privileged))
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("batch task failed: {e}")))
}

async fn m3_batch(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, (StatusCode, String)> {
    run_batch(Arc::clone(&state.engine), request, false).await
}

async fn m3_batch_privileged(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, (StatusCode, String)> {
    let _writer = state.writer.lock().await;
    run_batch(Arc::clone(&state.engine), request, true).await
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("M3_SERVER_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("M3_SERVER_PORT").unwrap_or_else(|_| "6800".to_string());
    let addr = format!("{bind}:{port}");

    let config = match std::env::var("M3_CONFIG") {
        Ok(path) => EngineConfig::load(&PathBuf::from(path)).unwrap_or_else(|e| {
            tracing::error!("failed to load engine config: {e}");
            std::process::exit(1);
        }),
        Err(_) => EngineConfig::default(),
    };
    let engine = BatchEngine::new(config).unwrap_or_else(|e| {
        tracing::error!("failed to initialize engine: {e}");
        std::process::exit(1);
    });

    let state = Arc::new(ServerState {
        engine: Arc::new(engine),
        writer: Mutex::new(()),
    });

    tracing::info!("m3 server initialized");

    let app = Router::new()
        .route("/health", get(health))
        .route("/m3Batch", post(m3_batch))
        .route("/m3BatchPrivileged", post(m3_batch_privileged))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("m3 server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
