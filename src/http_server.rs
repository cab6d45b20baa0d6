/// HTTP Server Module
///
/// Small status surface for watch mode: health, last cycle report, and a
/// manual trigger for an extra cycle.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::launch_window::LaunchWindowState;
use crate::pipeline::{CycleReport, Relay};

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub status: Arc<RwLock<RunStatus>>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub total_cycles: u32,
    pub launch_window: Option<LaunchWindowState>,
}

impl RunStatus {
    pub fn record(&mut self, report: CycleReport) {
        self.last_run = Some(report.started_at);
        self.last_report = Some(report);
        self.total_cycles += 1;
    }
}

/// Create and configure the HTTP server router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_endpoint))
        .route("/run", post(run_endpoint))
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "launch_relay_bot",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn status_endpoint(State(state): State<AppState>) -> Json<RunStatus> {
    let status = state.status.read().await;
    Json(status.clone())
}

/// Run one cycle now; waits for any scheduled cycle in progress
async fn run_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CycleReport>, StatusCode> {
    if let Some(secret) = &state.secret {
        let token = headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        if token != Some(secret.as_str()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    log::info!("Cycle triggered via HTTP endpoint");

    let report = state.relay.run_cycle(Utc::now()).await;
    state.status.write().await.record(report.clone());

    Ok(Json(report))
}

/// Start the HTTP server
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .context("Failed to bind HTTP server")?;

    log::info!("HTTP server listening on port {}", port);

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
