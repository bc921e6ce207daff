//! Recoverable capture failures.
//!
//! None of these stop the sampling loop; they abort the current capture,
//! reset the indicator, and are reported on the operator log only.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} could not grab a frame from {device} ({status}): {stderr}")]
    Failed {
        program: String,
        device: String,
        status: String,
        stderr: String,
    },

    #[error("no frame received from {device}")]
    Empty { device: String },

    #[error("cannot decode frame from {device}: {source}")]
    Decode {
        device: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("save worker for {} failed: {reason}", path.display())]
    Worker { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("sensor: {0}")]
    Sensor(#[from] SensorError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Shutdown arrived before the shutter fired.
    #[error("cancelled before the shutter")]
    Cancelled,
}
