//! Status sinks – reflect the capture indicator to the user.

use std::path::PathBuf;

use tracing::{debug, warn};

use glimpse_common::status::CaptureStatus;

/// Receives every change of the capture indicator.
///
/// Called from the capture task; implementations must not block.
pub trait StatusSink: Send + Sync {
    fn set(&self, status: CaptureStatus);
}

/// Mirrors the indicator into a small text file (`idle` / `capturing`) that a
/// panel applet or shell prompt can watch, and logs every transition.
pub struct StatusIndicator {
    file: Option<PathBuf>,
}

impl StatusIndicator {
    pub fn new(file: Option<PathBuf>) -> Self {
        let indicator = Self { file };
        indicator.set(CaptureStatus::Idle);
        indicator
    }
}

impl StatusSink for StatusIndicator {
    fn set(&self, status: CaptureStatus) {
        debug!("Capture indicator → {status}");
        if let Some(path) = &self.file {
            if let Err(e) = std::fs::write(path, format!("{status}\n")) {
                warn!("Cannot update status file {}: {e}", path.display());
            }
        }
    }
}
