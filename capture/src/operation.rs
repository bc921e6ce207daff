//! One end-to-end capture: warn the subject, wait, shoot, save, wait,
//! confirm.
//!
//! The two fixed delays are part of the contract.  The first lets the
//! notification be read before the shutter fires.  The second keeps
//! notifications from stacking and, together with the first, guarantees
//! that two captures never land in the same one-second file name.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use glimpse_common::config::Config;
use glimpse_common::snapshot::CaptureRecord;
use glimpse_common::status::{CaptureStatus, SharedStatus};

use crate::clock::Clock;
use crate::error::CaptureError;
use crate::indicator::StatusSink;
use crate::notifier::Notifier;
use crate::sensor::Sensor;
use crate::store::Store;

/// Shown before the shutter fires.
pub const SMILE_MESSAGE: &str = "Smile! glimpse is 👀... you do know the drill :)";

/// Shown once the snapshot is on disk.
pub fn saved_message(path: &Path) -> String {
    format!("glimpse saved your picture: {} :)", path.display())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    /// Between the warning notification and the shutter.
    pub reaction: Duration,
    /// Between saving and the confirmation notification.
    pub flood_guard: Duration,
}

impl CaptureTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reaction: config.reaction_delay,
            flood_guard: config.flood_guard_delay,
        }
    }
}

/// Collaborators used by a capture. Each one can be replaced in tests.
#[derive(Clone)]
pub struct CaptureDependencies {
    pub sensor: Arc<dyn Sensor>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub sink: Arc<dyn StatusSink>,
    pub clock: Arc<dyn Clock>,
}

/// Performs captures. `execute` takes `&mut self`, so whoever owns the
/// operation can only ever run one capture at a time.
pub struct CaptureOperation {
    deps: CaptureDependencies,
    status: SharedStatus,
    root: PathBuf,
    timing: CaptureTiming,
}

impl CaptureOperation {
    pub fn new(deps: CaptureDependencies, root: PathBuf, timing: CaptureTiming) -> Self {
        Self {
            deps,
            status: SharedStatus::default(),
            root,
            timing,
        }
    }

    /// Read handle on the capture indicator.
    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Run one capture.
    ///
    /// Cancellation before the shutter abandons the capture; after the
    /// shutter it only shortens the flood guard, so a taken picture is
    /// always saved and confirmed.  The indicator is back to `Idle` on
    /// every return path.  Failures are not announced to the user.
    pub async fn execute(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CaptureRecord, CaptureError> {
        let _indicator = IndicatorGuard::raise(&self.status, self.deps.sink.as_ref());
        self.deps.notifier.show(SMILE_MESSAGE).await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CaptureError::Cancelled),
            _ = tokio::time::sleep(self.timing.reaction) => {}
        }

        debug!("Getting image");
        let image = self.deps.sensor.capture().await?;

        let record = CaptureRecord::new(&self.root, self.deps.clock.now().naive_local());
        self.deps.store.ensure_dir(record.dir()).await?;
        self.deps.store.save(&image, &record.path).await?;
        info!("Photo: {}", record.path.display());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => debug!("Shutdown pending, cutting the flood guard short"),
            _ = tokio::time::sleep(self.timing.flood_guard) => {}
        }

        self.deps
            .notifier
            .show(&saved_message(&record.path))
            .await;
        Ok(record)
    }
}

/// Holds the indicator at `Capturing` for its lifetime.
struct IndicatorGuard<'a> {
    status: &'a SharedStatus,
    sink: &'a dyn StatusSink,
}

impl<'a> IndicatorGuard<'a> {
    fn raise(status: &'a SharedStatus, sink: &'a dyn StatusSink) -> Self {
        status.set(CaptureStatus::Capturing);
        sink.set(CaptureStatus::Capturing);
        Self { status, sink }
    }
}

impl Drop for IndicatorGuard<'_> {
    fn drop(&mut self) {
        self.status.set(CaptureStatus::Idle);
        self.sink.set(CaptureStatus::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SensorError, StoreError};
    use crate::store::FsStore;
    use crate::testing::{local, FakeSensor, MemoryStore, Rig, TickingClock};
    use glimpse_common::status::CaptureStatus::{Capturing, Idle};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_success_path() {
        let rig = Rig::default();
        let mut op = rig.operation();
        let status = op.status();
        assert_eq!(status.get(), Idle);

        let start = Instant::now();
        let record = op.execute(&CancellationToken::new()).await.unwrap();

        let expected = PathBuf::from("/data/2024/2024-03-02_140509.jpg");
        assert_eq!(record.path, expected);
        assert_eq!(rig.store.dirs(), vec![PathBuf::from("/data/2024")]);
        assert_eq!(rig.store.saved(), vec![expected.clone()]);
        assert_eq!(
            rig.notifier.messages(),
            vec![SMILE_MESSAGE.to_string(), saved_message(&expected)]
        );
        assert_eq!(rig.sink.history(), vec![Capturing, Idle]);
        assert_eq!(status.get(), Idle);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(8) && elapsed < Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutter_waits_for_reaction_delay() {
        let rig = Rig::default();
        let start = Instant::now();
        rig.operation()
            .execute(&CancellationToken::new())
            .await
            .unwrap();
        let shots = rig.sensor.started_at();
        assert_eq!(shots.len(), 1);
        let delay = shots[0] - start;
        assert!(delay >= Duration::from_secs(3) && delay < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_is_capturing_while_in_flight() {
        let rig = Rig::new(FakeSensor::slow(Duration::from_secs(10)), MemoryStore::default());
        let mut op = rig.operation();
        let status = op.status();

        let task = tokio::spawn(async move { op.execute(&CancellationToken::new()).await });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(status.get(), Capturing);

        task.await.unwrap().unwrap();
        assert_eq!(status.get(), Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failure_resets_status_silently() {
        let rig = Rig::new(FakeSensor::failing(), MemoryStore::default());
        let mut op = rig.operation();

        let err = op.execute(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Sensor(SensorError::Empty { .. })));
        assert!(rig.store.dirs().is_empty());
        assert!(rig.store.saved().is_empty());
        assert_eq!(rig.notifier.messages(), vec![SMILE_MESSAGE.to_string()]);
        assert_eq!(rig.sink.history(), vec![Capturing, Idle]);
        assert_eq!(op.status().get(), Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_failure_is_a_store_failure() {
        let rig = Rig::new(FakeSensor::default(), MemoryStore::failing_dirs());
        let mut op = rig.operation();

        let err = op.execute(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Store(StoreError::CreateDir { .. })));
        assert!(rig.store.saved().is_empty());
        assert_eq!(rig.notifier.messages(), vec![SMILE_MESSAGE.to_string()]);
        assert_eq!(rig.sink.history(), vec![Capturing, Idle]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_resets_status() {
        let rig = Rig::new(FakeSensor::default(), MemoryStore::failing_saves());
        let mut op = rig.operation();

        let err = op.execute(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Store(StoreError::Write { .. })));
        assert_eq!(rig.notifier.messages(), vec![SMILE_MESSAGE.to_string()]);
        assert_eq!(rig.sink.history(), vec![Capturing, Idle]);
        assert_eq!(op.status().get(), Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_shutter_takes_no_picture() {
        let rig = Rig::default();
        let mut op = rig.operation();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = op.execute(&cancel).await.unwrap_err();
        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(rig.sensor.calls(), 0);
        assert!(rig.store.saved().is_empty());
        assert_eq!(rig.sink.history(), vec![Capturing, Idle]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_shutter_still_completes() {
        let rig = Rig::default();
        let mut op = rig.operation();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let record = op.execute(&cancel).await.unwrap();
        // Cut short at 4 s instead of running the full 3 + 5.
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(rig.store.saved(), vec![record.path.clone()]);
        assert_eq!(rig.notifier.messages().len(), 2);
        assert_eq!(op.status().get(), Idle);
    }

    #[tokio::test]
    async fn test_writes_into_year_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = Rig::default();
        let deps = CaptureDependencies {
            store: Arc::new(FsStore::new(90)),
            ..rig.deps()
        };
        let mut op = CaptureOperation::new(
            deps,
            tmp.path().to_path_buf(),
            CaptureTiming {
                reaction: Duration::ZERO,
                flood_guard: Duration::ZERO,
            },
        );

        let record = op.execute(&CancellationToken::new()).await.unwrap();
        assert_eq!(record.path, tmp.path().join("2024/2024-03-02_140509.jpg"));
        assert!(tmp.path().join("2024").is_dir());
        assert!(record.path.is_file());
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_captures_get_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = Rig::default();
        let deps = CaptureDependencies {
            store: Arc::new(FsStore::new(90)),
            clock: Arc::new(TickingClock::starting_at(local(2024, 3, 2, 14, 5, 9))),
            ..rig.deps()
        };
        let mut op = CaptureOperation::new(
            deps,
            tmp.path().to_path_buf(),
            CaptureTiming {
                reaction: Duration::ZERO,
                flood_guard: Duration::from_secs(1),
            },
        );

        let first = op.execute(&CancellationToken::new()).await.unwrap();
        let second = op.execute(&CancellationToken::new()).await.unwrap();
        assert_ne!(first.path, second.path);
        assert!(first.path.is_file());
        assert!(second.path.is_file());
    }

    #[tokio::test]
    async fn test_same_second_capture_keeps_first_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let rig = Rig::default();
        let deps = CaptureDependencies {
            store: Arc::new(FsStore::new(90)),
            ..rig.deps()
        };
        let mut op = CaptureOperation::new(
            deps,
            tmp.path().to_path_buf(),
            CaptureTiming {
                reaction: Duration::ZERO,
                flood_guard: Duration::ZERO,
            },
        );

        let first = op.execute(&CancellationToken::new()).await.unwrap();
        let before = std::fs::read(&first.path).unwrap();

        let err = op.execute(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Store(StoreError::Write { .. })), "{err}");
        assert_eq!(std::fs::read(&first.path).unwrap(), before);
        assert_eq!(op.status().get(), Idle);
    }
}
