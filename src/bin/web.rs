//! Agil HTTP 接口
//!
//! POST /chat 接收 {message, session_id?}，返回 {response}；GET /api/health 用于存活检查（附活跃会话数）。
//! 后台任务按 cleanup_interval_secs 清理空闲会话。
//!
//! 运行：cargo run --bin agil-web --features web

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use agil::agent::create_runtime;
use agil::config::load_config_or_default;
use agil::gateway::{ChatReply, ChatRequest, ChatRuntime};
use agil::observability;

async fn health(State(runtime): State<Arc<ChatRuntime>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "active_sessions": runtime.active_sessions().await,
    }))
}

async fn chat(
    State(runtime): State<Arc<ChatRuntime>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }
    let request_id = uuid::Uuid::new_v4();
    tracing::debug!(%request_id, session = %req.session_id, "Chat request");
    Ok(Json(runtime.handle(&req).await))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(None);
    let runtime = Arc::new(create_runtime(&cfg).context("Failed to load bank data")?);

    // 定期清理空闲会话
    let cleanup_runtime = Arc::clone(&runtime);
    let cleanup_secs = cfg.session.cleanup_interval_secs.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            cleanup_runtime.cleanup_expired().await;
        }
    });

    let app = Router::new()
        .route("/chat", post(chat))
        .route("/api/health", get(health))
        .with_state(runtime);

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind))?;
    tracing::info!("Agil web listening on http://{}", cfg.server.bind);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
