//! Read-only HTTP surface over the monitoring state.
//!
//! Handlers copy history series out of the shared state and query the
//! snapshot source directly for on-demand views. Nothing here writes to
//! history or cooldown state.

use crate::alert::HostIdentity;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ranker::{self, ProcessRanker, RankBy};
use crate::source::{SnapshotSource, SourceError};
use crate::state::MonitorState;
use crate::types::{ProcessRecord, SystemInfo};
use crate::ui;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<MonitorState>,
    pub source: Arc<dyn SnapshotSource>,
    pub metrics: Arc<Metrics>,
    pub host: HostIdentity,
    pub cpu_window: Duration,
    pub top_k: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::dashboard_handler))
        .route("/cpu", get(cpu_history))
        .route("/memory", get(memory_history))
        .route("/disk", get(disk_history))
        .route("/disks", get(all_disk_history))
        .route("/processes", get(processes))
        .route("/processes/top", get(top_processes))
        .route("/system_info", get(system_info))
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    ServiceUnavailable(String),
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        Self::ServiceUnavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::ServiceUnavailable(message) => {
                warn!("[api] metric query failed: {message}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

async fn cpu_history(State(state): State<AppState>) -> Json<Vec<f32>> {
    Json(state.monitor.cpu.snapshot())
}

async fn memory_history(State(state): State<AppState>) -> Json<Vec<f32>> {
    Json(state.monitor.memory.snapshot())
}

async fn disk_history(State(state): State<AppState>) -> Json<Vec<f32>> {
    Json(
        state
            .monitor
            .primary_disk()
            .map(|d| d.history.snapshot())
            .unwrap_or_default(),
    )
}

async fn all_disk_history(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<f32>>> {
    Json(state.monitor.disk_snapshots())
}

async fn processes(State(state): State<AppState>) -> Json<Vec<ProcessRecord>> {
    Json(ranker::collect_live(state.source.processes().await))
}

#[derive(Debug, Deserialize)]
struct TopQuery {
    k: Option<usize>,
    #[serde(default)]
    by: RankBy,
}

async fn top_processes(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Json<Vec<ProcessRecord>> {
    let k = query.k.unwrap_or(state.top_k);
    Json(ProcessRanker::new(state.source).top(k, query.by).await)
}

async fn system_info(State(state): State<AppState>) -> Result<Json<SystemInfo>, ApiError> {
    let cpu_usage = state.source.cpu_percent(state.cpu_window).await?;
    let memory = state.source.memory().await?;
    let disk = state.source.disk(Path::new("/")).await?;

    Ok(Json(SystemInfo {
        cpu_count: state.source.cpu_count(),
        cpu_usage,
        free_cpu: 100.0 - cpu_usage,
        total_memory: memory.total as f64 / MB,
        free_memory: memory.free as f64 / MB,
        memory_usage: memory.percent,
        total_disk: disk.total as f64 / GB,
        free_disk: disk.free as f64 / GB,
        disk_usage: disk.percent,
    }))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    server_name: String,
    public_ip: String,
    mounts: Vec<String>,
    #[serde(flatten)]
    counters: MetricsSnapshot,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        server_name: state.host.server_name.clone(),
        public_ip: state.host.public_ip.clone(),
        mounts: state
            .monitor
            .disks
            .iter()
            .map(|d| d.mount.path.clone())
            .collect(),
        counters: state.metrics.snapshot(),
    })
}
