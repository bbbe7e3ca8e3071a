use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::breaker::CircuitSummary;
use crate::config::duration::format_duration;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::remediation::WorkflowCheckpoint;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub resident_circuits: usize,
    pub window_size: String,
    pub failure_threshold: u32,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let settings = state.directory.settings();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        resident_circuits: state.directory.resident(),
        window_size: format_duration(settings.window_size),
        failure_threshold: settings.failure_threshold,
    })
}

pub async fn get_circuits(State(state): State<AppState>) -> Result<Json<Vec<CircuitSummary>>, ApiError> {
    Ok(Json(state.directory.circuits().await?))
}

/// Remediation checkpoints, newest first.
pub async fn get_remediations(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowCheckpoint>>, StatusCode> {
    let mut checkpoints = state.store.list_checkpoints().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list remediation checkpoints");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    checkpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(checkpoints))
}
