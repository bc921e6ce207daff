//! Capture and scheduler state, plus the atomic cell both are published in.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Whether a capture is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    #[default]
    Idle,
    Capturing,
}

/// Lifecycle of the sampling loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
        })
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        })
    }
}

/// Two-valued state that can be stored in a `u8` cell.
pub trait CellValue: Copy {
    fn to_u8(self) -> u8;
    fn from_u8(v: u8) -> Self;
}

impl CellValue for CaptureStatus {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(v: u8) -> Self {
        if v == Self::Capturing as u8 {
            Self::Capturing
        } else {
            Self::Idle
        }
    }
}

impl CellValue for SchedulerState {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(v: u8) -> Self {
        if v == Self::Running as u8 {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

/// Cloneable handle to an atomically updated state value.
///
/// One writer, any number of readers; every clone sees the same cell.
#[derive(Clone)]
pub struct Shared<T: CellValue> {
    cell: Arc<AtomicU8>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

pub type SharedStatus = Shared<CaptureStatus>;
pub type SharedSchedulerState = Shared<SchedulerState>;

impl<T: CellValue + Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: CellValue> Shared<T> {
    pub fn new(initial: T) -> Self {
        Self {
            cell: Arc::new(AtomicU8::new(initial.to_u8())),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn get(&self) -> T {
        T::from_u8(self.cell.load(Ordering::Acquire))
    }

    pub fn set(&self, value: T) {
        self.cell.store(value.to_u8(), Ordering::Release);
    }
}

impl<T: CellValue + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.get()).finish()
    }
}
