//! The sampling policy: how often a tick happens and whether it captures.

use crate::error::ConfigError;

/// Immutable sampling parameters, validated once at startup.
///
/// Fields are private so the invariants checked by [`SamplingPolicy::new`]
/// hold for every value in circulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    sample_percent: u32,
    window_start_hour: u32,
    window_stop_hour: u32,
    max_idle_minutes: u32,
}

impl SamplingPolicy {
    pub fn new(
        sample_percent: u32,
        window_start_hour: u32,
        window_stop_hour: u32,
        max_idle_minutes: u32,
    ) -> Result<Self, ConfigError> {
        if sample_percent > 100 {
            return Err(ConfigError::SamplePercent(sample_percent));
        }
        if window_start_hour > window_stop_hour || window_stop_hour > 23 {
            return Err(ConfigError::Window {
                start: window_start_hour,
                stop: window_stop_hour,
            });
        }
        if max_idle_minutes == 0 {
            return Err(ConfigError::MaxIdle);
        }
        Ok(Self {
            sample_percent,
            window_start_hour,
            window_stop_hour,
            max_idle_minutes,
        })
    }

    pub fn sample_percent(&self) -> u32 {
        self.sample_percent
    }

    pub fn window_start_hour(&self) -> u32 {
        self.window_start_hour
    }

    pub fn window_stop_hour(&self) -> u32 {
        self.window_stop_hour
    }

    /// Exclusive upper bound of the randomized wait between ticks.
    pub fn max_idle_minutes(&self) -> u32 {
        self.max_idle_minutes
    }

    /// Probability gate: `roll` is uniform in `0..100`.
    pub fn is_lucky(&self, roll: u32) -> bool {
        roll < self.sample_percent
    }

    /// Time-of-day gate, inclusive on both ends.
    pub fn admits_hour(&self, hour: u32) -> bool {
        (self.window_start_hour..=self.window_stop_hour).contains(&hour)
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            sample_percent: 5,
            window_start_hour: 9,
            window_stop_hour: 17,
            max_idle_minutes: 10,
        }
    }
}
