//! Startup configuration errors.
//!
//! All of these are fatal: the daemon refuses to start rather than sample
//! with a half-valid policy.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{key}: cannot parse {value:?} as {expected}")]
    Parse {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("malformed resolution {0:?}, expected <width>x<height>")]
    Resolution(String),

    #[error("sample percent {0} is outside 0..=100")]
    SamplePercent(u32),

    #[error("capture window {start}..={stop} is not an hour range within 0..=23")]
    Window { start: u32, stop: u32 },

    #[error("max idle minutes must be greater than zero")]
    MaxIdle,

    #[error("reaction and flood guard delays add up to {0:?}; captures need at least one second between them")]
    CaptureSpacing(std::time::Duration),

    #[error("JPEG quality {0} is outside 1..=100")]
    JpegQuality(u32),

    #[error("no SAVEDIR configured and no pictures directory could be determined")]
    NoSaveDir,
}
