//! Local control server – the headless stand-in for a tray menu.
//!
//! Routes:
//!   GET  /api/health                  → health check
//!   GET  /api/status                  → capture indicator + loop state
//!   POST /api/capture                 → "photo now!"
//!   GET  /api/snapshots               → list stored snapshots
//!   GET  /api/snapshots/:year/:name   → download a snapshot

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, TimeZone};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use glimpse_common::protocol::{HealthResponse, SnapshotInfo, StatusResponse, TriggerResponse};
use glimpse_common::snapshot::parse_snapshot_name;
use glimpse_common::status::{SharedSchedulerState, SharedStatus};

use crate::scheduler::{ManualTrigger, TriggerOutcome};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    save_dir: PathBuf,
    start_time: Instant,
    status: SharedStatus,
    scheduler: SharedSchedulerState,
    trigger: ManualTrigger,
}

impl AppState {
    pub fn new(
        save_dir: PathBuf,
        status: SharedStatus,
        scheduler: SharedSchedulerState,
        trigger: ManualTrigger,
    ) -> Self {
        Self {
            save_dir,
            start_time: Instant::now(),
            status,
            scheduler,
            trigger,
        }
    }
}

/// Bind the control address. Done before anything else starts so a taken
/// or malformed address stops the daemon at startup.
pub async fn bind(listen_addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Cannot bind control server to {listen_addr}"))?;
    info!("Control server listening on {listen_addr}");
    Ok(listener)
}

/// Serve until `cancel` fires.
pub async fn run(state: AppState, listener: TcpListener, cancel: CancellationToken) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/capture", post(capture_now))
        .route("/api/snapshots", get(snapshots))
        .route("/api/snapshots/{year}/{name}", get(download_snapshot))
        .layer(CorsLayer::permissive())
        .with_state(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("Control server stopped");
    Ok(())
}

// ── route handlers ───────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        capture: state.status.get(),
        scheduler: state.scheduler.get(),
    })
}

async fn capture_now(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    match state.trigger.fire() {
        TriggerOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                accepted: true,
                message: "capture requested".to_string(),
            }),
        ),
        TriggerOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(TriggerResponse {
                accepted: false,
                message: "a capture is already in progress".to_string(),
            }),
        ),
    }
}

async fn snapshots(
    State(state): State<AppState>,
) -> Result<Json<Vec<SnapshotInfo>>, StatusCode> {
    let root = state.save_dir.clone();
    tokio::task::spawn_blocking(move || list_snapshots(&root))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn download_snapshot(
    State(state): State<AppState>,
    UrlPath((year, name)): UrlPath<(String, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    // Sanitise: prevent directory traversal
    if !is_year(&year) || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StatusCode::BAD_REQUEST);
    }

    let file_path = state.save_dir.join(&year).join(&name);
    if parse_snapshot_name(&file_path).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !file_path.exists() {
        return Err(StatusCode::NOT_FOUND);
    }

    let bytes = tokio::fs::read(&file_path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, "image/jpeg")],
        Body::from(bytes),
    ))
}

// ── helpers ──────────────────────────────────────────────────────────────

fn is_year(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Every snapshot under `<root>/<YYYY>/`, oldest first.
fn list_snapshots(root: &Path) -> std::io::Result<Vec<SnapshotInfo>> {
    let mut found = Vec::new();
    if !root.exists() {
        return Ok(found);
    }

    for year in std::fs::read_dir(root)?.flatten() {
        let year_name = year.file_name().to_string_lossy().to_string();
        if !is_year(&year_name) || !year.path().is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(year.path())?.flatten() {
            let path = entry.path();
            let Some(taken_at) = parse_snapshot_name(&path) else {
                continue;
            };
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            found.push(SnapshotInfo {
                path: format!("{}/{}", year_name, entry.file_name().to_string_lossy()),
                size: meta.len(),
                taken_at: Local
                    .from_local_datetime(&taken_at)
                    .earliest()
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| taken_at.format("%Y-%m-%dT%H:%M:%S").to_string()),
            });
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}
