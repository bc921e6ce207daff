//! The sampling loop.
//!
//! Each tick waits a random number of minutes, then rolls the probability
//! gate, then checks the time-of-day window, and only then captures.  The
//! window is checked last so that the common case (bad luck) costs nothing.
//! A manual trigger interrupts the wait and captures without either gate.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use glimpse_common::policy::SamplingPolicy;
use glimpse_common::status::{
    CaptureStatus, SchedulerState, SharedSchedulerState, SharedStatus,
};

use crate::clock::{Clock, RandomSource};
use crate::error::CaptureError;
use crate::operation::CaptureOperation;

/// Shortest pause between ticks. Zero-minute idle rolls still suspend.
pub const MIN_TICK: Duration = Duration::from_secs(1);

/// What a tick decided once its wait was over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    BadLuck { roll: u32 },
    OutsideWindow { hour: u32 },
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    /// A capture was already in flight; the request was dropped.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureReason {
    Scheduled,
    Manual,
}

impl fmt::Display for CaptureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        })
    }
}

enum Wake {
    Elapsed,
    Triggered,
    Cancelled,
}

/// "Capture now" requests from outside the loop.
///
/// Requests made while a capture is in flight are dropped rather than
/// queued.  A request made between captures is remembered (at most one)
/// and served at the start of the next wait.
#[derive(Clone)]
pub struct ManualTrigger {
    notify: Arc<Notify>,
    status: SharedStatus,
}

impl ManualTrigger {
    pub fn fire(&self) -> TriggerOutcome {
        if self.status.get() == CaptureStatus::Capturing {
            info!("Manual capture dropped: a capture is already in flight");
            return TriggerOutcome::Busy;
        }
        debug!("Manual capture requested");
        self.notify.notify_one();
        TriggerOutcome::Accepted
    }
}

pub struct Scheduler {
    policy: SamplingPolicy,
    warmup: Duration,
    operation: CaptureOperation,
    clock: Arc<dyn Clock>,
    random: Box<dyn RandomSource>,
    trigger: Arc<Notify>,
    state: SharedSchedulerState,
    /// Last out-of-window hour reported at `info`.
    quiet_hour: Option<u32>,
}

impl Scheduler {
    pub fn new(
        policy: SamplingPolicy,
        warmup: Duration,
        operation: CaptureOperation,
        clock: Arc<dyn Clock>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            policy,
            warmup,
            operation,
            clock,
            random,
            trigger: Arc::new(Notify::new()),
            state: SharedSchedulerState::default(),
            quiet_hour: None,
        }
    }

    pub fn trigger(&self) -> ManualTrigger {
        ManualTrigger {
            notify: self.trigger.clone(),
            status: self.operation.status(),
        }
    }

    pub fn status(&self) -> SharedStatus {
        self.operation.status()
    }

    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Random wait before the next tick, in whole minutes below the policy's bound.
    pub fn next_idle(&mut self) -> Duration {
        let minutes = self.random.below(self.policy.max_idle_minutes());
        Duration::from_secs(u64::from(minutes) * 60)
    }

    /// Apply the probability gate, then the time-of-day gate.
    pub fn decide(&mut self) -> TickOutcome {
        let roll = self.random.below(100);
        if !self.policy.is_lucky(roll) {
            return TickOutcome::BadLuck { roll };
        }
        let hour = self.clock.now().hour();
        if !self.policy.admits_hour(hour) {
            return TickOutcome::OutsideWindow { hour };
        }
        TickOutcome::Capture
    }

    /// Run until `cancel` fires. Consumes the scheduler: a stopped loop
    /// is not restarted, a new one is built instead.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.state.set(SchedulerState::Running);
        info!(
            "Sampling loop started (pctg={}%, window={}..={}h, max idle={} min)",
            self.policy.sample_percent(),
            self.policy.window_start_hour(),
            self.policy.window_stop_hour(),
            self.policy.max_idle_minutes(),
        );

        if !self.warmup.is_zero() {
            info!("Warming up for {}s before the first tick", self.warmup.as_secs());
            match self.wait(self.warmup, &cancel).await {
                Wake::Cancelled => return self.stop(),
                Wake::Triggered => self.capture(CaptureReason::Manual, &cancel).await,
                Wake::Elapsed => {}
            }
        }

        while !cancel.is_cancelled() {
            let idle = self.next_idle().max(MIN_TICK);
            debug!("Next tick in {}s", idle.as_secs());
            match self.wait(idle, &cancel).await {
                Wake::Cancelled => break,
                Wake::Triggered => {
                    self.capture(CaptureReason::Manual, &cancel).await;
                    continue;
                }
                Wake::Elapsed => {}
            }

            match self.decide() {
                TickOutcome::BadLuck { roll } => debug!(
                    "Bad luck ({roll} ≥ {}), waiting",
                    self.policy.sample_percent()
                ),
                TickOutcome::OutsideWindow { hour } => self.report_outside(hour),
                TickOutcome::Capture => {
                    self.quiet_hour = None;
                    self.capture(CaptureReason::Scheduled, &cancel).await
                }
            }
        }

        self.stop();
    }

    fn stop(&self) {
        self.state.set(SchedulerState::Stopped);
        info!("Sampling loop stopped");
    }

    /// Once per hour at `info`, every other tick at `debug`.
    fn report_outside(&mut self, hour: u32) {
        let (start, stop) = (self.policy.window_start_hour(), self.policy.window_stop_hour());
        if self.quiet_hour == Some(hour) {
            debug!("Not a good time: {hour}h is outside {start}..={stop}h");
        } else {
            info!("Not a good time: {hour}h is outside {start}..={stop}h");
            self.quiet_hour = Some(hour);
        }
    }

    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Wake {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = self.trigger.notified() => Wake::Triggered,
            _ = tokio::time::sleep(duration) => Wake::Elapsed,
        }
    }

    async fn capture(&mut self, reason: CaptureReason, cancel: &CancellationToken) {
        info!("Capture starting ({reason})");
        match self.operation.execute(cancel).await {
            Ok(record) => debug!("Capture finished: {}", record.path.display()),
            Err(CaptureError::Cancelled) => info!("Capture abandoned: shutting down"),
            Err(e) => error!("Capture failed ({reason}): {e}"),
        }
    }
}
