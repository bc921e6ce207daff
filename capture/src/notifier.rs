//! Desktop notifications via `notify-send`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

const APP_NAME: &str = "glimpse";

/// Shows a short-lived, low-urgency message to the user.
///
/// Fire-and-forget: implementations must not block the capture on the
/// message actually being displayed.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, message: &str);
}

pub struct DesktopNotifier {
    enabled: bool,
    program: String,
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            program: "notify-send".to_string(),
        }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn show(&self, message: &str) {
        if !self.enabled {
            info!("[notify] {message}");
            return;
        }

        let app_name = format!("--app-name={APP_NAME}");
        let spawned = Command::new(&self.program)
            .args(["--urgency=low", app_name.as_str(), APP_NAME, message])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                debug!("Notification sent: {message}");
                // Reap the child in the background.
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            warn!("notify-send exited with {status}")
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Cannot wait for notify-send: {e}"),
                    }
                });
            }
            Err(e) => warn!("Cannot run {}: {e} (message was: {message})", self.program),
        }
    }
}
