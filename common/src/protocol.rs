//! HTTP protocol types for the local control server.

use serde::{Deserialize, Serialize};

use crate::status::{CaptureStatus, SchedulerState};

/// Health-check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Current capture indicator and sampling loop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub capture: CaptureStatus,
    pub scheduler: SchedulerState,
}

/// Answer to a manual "capture now" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub accepted: bool,
    pub message: String,
}

/// A stored snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Path relative to the save root, e.g. `2024/2024-03-02_140509.jpg`.
    pub path: String,
    pub size: u64,
    /// ISO-8601 local capture time, taken from the file name.
    pub taken_at: String,
}
