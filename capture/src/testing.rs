//! In-memory collaborators for exercising the capture pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use image::{DynamicImage, RgbImage};
use tokio::time::Instant;

use glimpse_common::status::CaptureStatus;

use crate::clock::{Clock, RandomSource};
use crate::error::{SensorError, StoreError};
use crate::indicator::StatusSink;
use crate::notifier::Notifier;
use crate::operation::{CaptureDependencies, CaptureOperation, CaptureTiming};
use crate::sensor::{Image, Sensor};
use crate::store::Store;

/// Sensor that takes `delay` (tokio time) per frame and tracks overlap.
#[derive(Default)]
pub struct FakeSensor {
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started_at: Mutex<Vec<Instant>>,
}

impl FakeSensor {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn started_at(&self) -> Vec<Instant> {
        self.started_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sensor for FakeSensor {
    async fn capture(&self) -> Result<Image, SensorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started_at.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            Err(SensorError::Empty {
                device: "/dev/fake".to_string(),
            })
        } else {
            Ok(DynamicImage::ImageRgb8(RgbImage::new(4, 3)))
        }
    }
}

/// Store that only remembers what it was asked to do.
#[derive(Default)]
pub struct MemoryStore {
    fail_dir: bool,
    fail_save: bool,
    dirs: Mutex<Vec<PathBuf>>,
    saved: Mutex<Vec<PathBuf>>,
}

impl MemoryStore {
    pub fn failing_dirs() -> Self {
        Self {
            fail_dir: true,
            ..Default::default()
        }
    }

    pub fn failing_saves() -> Self {
        Self {
            fail_save: true,
            ..Default::default()
        }
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        if self.fail_dir {
            return Err(StoreError::CreateDir {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.dirs.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }

    async fn save(&self, _image: &Image, path: &Path) -> Result<(), StoreError> {
        if self.fail_save {
            return Err(StoreError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.saved.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingSink {
    history: Mutex<Vec<CaptureStatus>>,
}

impl RecordingSink {
    pub fn history(&self) -> Vec<CaptureStatus> {
        self.history.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn set(&self, status: CaptureStatus) {
        self.history.lock().unwrap().push(status);
    }
}

/// Clock frozen at a settable local time.
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    /// 2024-03-02 at `hour`:05:09 local time.
    pub fn at_hour(hour: u32) -> Self {
        Self {
            now: Mutex::new(local(2024, 3, 2, hour, 5, 9)),
        }
    }

    pub fn set_hour(&self, hour: u32) {
        *self.now.lock().unwrap() = local(2024, 3, 2, hour, 5, 9);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

/// Clock that starts at `base` and moves with tokio time, so it follows
/// the paused test clock.
pub struct TickingClock {
    base: DateTime<Local>,
    started: Instant,
}

impl TickingClock {
    pub fn starting_at(base: DateTime<Local>) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap();
        self.base + elapsed
    }
}

pub fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Always returns `value`, clamped below the requested bound.
pub struct ConstRandom(pub u32);

impl RandomSource for ConstRandom {
    fn below(&mut self, bound: u32) -> u32 {
        self.0.min(bound - 1)
    }
}

/// All fakes wired together, with handles kept for assertions.
pub struct Rig {
    pub sensor: Arc<FakeSensor>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<FixedClock>,
}

impl Default for Rig {
    fn default() -> Self {
        Self::new(FakeSensor::default(), MemoryStore::default())
    }
}

impl Rig {
    pub fn new(sensor: FakeSensor, store: MemoryStore) -> Self {
        Self {
            sensor: Arc::new(sensor),
            store: Arc::new(store),
            notifier: Arc::new(RecordingNotifier::default()),
            sink: Arc::new(RecordingSink::default()),
            clock: Arc::new(FixedClock::at_hour(14)),
        }
    }

    pub fn deps(&self) -> CaptureDependencies {
        CaptureDependencies {
            sensor: self.sensor.clone(),
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            sink: self.sink.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Operation rooted at `/data` with 3 s reaction and 5 s flood guard.
    pub fn operation(&self) -> CaptureOperation {
        CaptureOperation::new(
            self.deps(),
            PathBuf::from("/data"),
            CaptureTiming {
                reaction: Duration::from_secs(3),
                flood_guard: Duration::from_secs(5),
            },
        )
    }

    /// Number of successfully saved snapshots.
    pub fn saved(&self) -> usize {
        self.store.saved().len()
    }
}
