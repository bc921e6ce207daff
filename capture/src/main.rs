//! glimpse capture daemon – photographs you at random moments inside a daily
//! window, and always tells you before and after.
//!
//! This binary:
//! 1. Reads configuration from `glimpse.conf` and `GLIMPSE_*` variables
//! 2. Runs the sampling loop on a background task
//! 3. Takes "photo now!" requests from SIGUSR1 and the local control server
//! 4. Stops cleanly on Ctrl-C / SIGTERM, letting an in-flight capture finish

mod clock;
mod error;
mod indicator;
mod notifier;
mod operation;
mod scheduler;
mod sensor;
mod server;
mod store;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::clock::{Clock, OsRandom, SystemClock};
use crate::indicator::StatusIndicator;
use crate::notifier::DesktopNotifier;
use crate::operation::{CaptureDependencies, CaptureOperation, CaptureTiming};
use crate::scheduler::{ManualTrigger, Scheduler};
use crate::sensor::FfmpegSensor;
use crate::store::FsStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── load config ──────────────────────────────────────────────────
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = glimpse_common::config::load(config_path.as_deref())
        .context("Config load failed")?;

    info!(
        "glimpse starting (camera={}, size={}, savedir={})",
        config.camera,
        config.resolution,
        config.save_dir.display()
    );

    std::fs::create_dir_all(&config.save_dir)
        .with_context(|| format!("Cannot create {}", config.save_dir.display()))?;

    // An explicitly configured control address must be usable.
    let listener = match config.control_listen_addr.as_deref() {
        Some(addr) => Some(server::bind(addr).await?),
        None => None,
    };

    // ── ctrl-c / SIGTERM ─────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        on_signal.cancel();
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── sampling loop ────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let deps = CaptureDependencies {
        sensor: Arc::new(FfmpegSensor::new(&config)),
        store: Arc::new(FsStore::new(config.jpeg_quality)),
        notifier: Arc::new(DesktopNotifier::new(config.notifications)),
        sink: Arc::new(StatusIndicator::new(config.status_file.clone())),
        clock: clock.clone(),
    };
    let operation = CaptureOperation::new(
        deps,
        config.save_dir.clone(),
        CaptureTiming::from_config(&config),
    );
    let scheduler = Scheduler::new(
        config.policy,
        config.warmup,
        operation,
        clock,
        Box::new(OsRandom::new()),
    );

    let trigger = scheduler.trigger();
    let status = scheduler.status();
    let state = scheduler.state();
    let sampler = tokio::spawn(scheduler.run(cancel.clone()));

    listen_for_photo_signal(trigger.clone(), cancel.clone())?;

    // ── control server ───────────────────────────────────────────────
    let server_task = listener.map(|listener| {
        let app = server::AppState::new(config.save_dir.clone(), status, state, trigger);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run(app, listener, cancel).await {
                error!("Control server error: {e:#}");
            }
        })
    });

    // Runs until the shutdown signal cancels it.
    sampler.await.context("Sampling task panicked")?;

    if let Some(task) = server_task {
        task.await.ok();
    }

    info!("glimpse stopped");
    Ok(())
}

/// SIGUSR1 means "photo now!" (`pkill -USR1 glimpse-capture`).
#[cfg(unix)]
fn listen_for_photo_signal(trigger: ManualTrigger, cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 =
        signal(SignalKind::user_defined1()).context("Cannot listen for SIGUSR1")?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = usr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("SIGUSR1: photo now");
                    trigger.fire();
                }
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn listen_for_photo_signal(_trigger: ManualTrigger, _cancel: CancellationToken) -> Result<()> {
    Ok(())
}
