//! Configuration parsing – reads a KEY=VALUE file and lets the environment
//! override any key with `GLIMPSE_<KEY>`.
//!
//! Unlike a best-effort loader, malformed values are rejected: the daemon
//! must never start sampling with a policy it cannot honour.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;
use crate::policy::SamplingPolicy;

/// Prefix for environment overrides, e.g. `GLIMPSE_PCTG=20`.
pub const ENV_PREFIX: &str = "GLIMPSE_";

/// Smallest reaction + flood guard total that keeps snapshot names unique.
pub const MIN_CAPTURE_SPACING: Duration = Duration::from_secs(1);

/// Frame size requested from the camera, written `<width>x<height>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::Resolution(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(bad)?;
        let width: u32 = w.trim().parse().map_err(|_| bad())?;
        let height: u32 = h.trim().parse().map_err(|_| bad())?;
        if width == 0 || height == 0 {
            return Err(bad());
        }
        Ok(Resolution { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Daemon configuration, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    // ── storage ──────────────────────────────────────────────────────
    pub save_dir: PathBuf,
    pub jpeg_quality: u8,

    // ── sensor ───────────────────────────────────────────────────────
    /// Capture device, e.g. `/dev/video0`.
    pub camera: String,
    /// ffmpeg input format for the device (`v4l2` on Linux).
    pub input_format: String,
    pub resolution: Resolution,

    // ── sampling ─────────────────────────────────────────────────────
    pub policy: SamplingPolicy,
    /// Delay before the first tick.
    pub warmup: Duration,
    /// Pause between the "smile" notification and the shutter.
    pub reaction_delay: Duration,
    /// Pause between saving and the "saved" notification.
    pub flood_guard_delay: Duration,

    // ── user-facing signals ──────────────────────────────────────────
    pub notifications: bool,
    /// File mirroring the capture indicator (`idle` / `capturing`).
    pub status_file: Option<PathBuf>,

    // ── control ──────────────────────────────────────────────────────
    /// Address for the local control server; `None` disables it.
    pub control_listen_addr: Option<String>,
}

impl Config {
    /// Default config path.
    pub fn default_path() -> &'static str {
        "/etc/glimpse/glimpse.conf"
    }
}

/// Load configuration from `path`, or from [`Config::default_path`] when it
/// exists, applying `GLIMPSE_*` environment overrides on top.
///
/// An explicitly given path that cannot be read is an error; a missing
/// default file just means "use defaults".
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let default_path = Path::new(Config::default_path());
    let source = match path {
        Some(p) => Some(p),
        None if default_path.exists() => Some(default_path),
        None => None,
    };

    let map = match source {
        Some(p) => {
            let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                path: p.to_path_buf(),
                source,
            })?;
            info!("Loaded config from {}", p.display());
            parse_conf(&text)
        }
        None => {
            info!("No config file, using defaults and environment");
            HashMap::new()
        }
    };

    from_map(&map, |key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
}

/// Build a [`Config`] from parsed file entries and an environment lookup.
///
/// `env` is consulted first for every key, so overrides win over the file.
pub fn from_map(
    map: &HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let get = |key: &str| -> Option<String> {
        env(key)
            .or_else(|| map.get(key).cloned())
            .map(|v| v.trim().to_string())
    };

    let save_dir = match get("SAVEDIR").filter(|s| !s.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::picture_dir()
            .map(|p| p.join("Webcam"))
            .ok_or(ConfigError::NoSaveDir)?,
    };

    let jpeg_quality = parse_or("JPEG_QUALITY", get("JPEG_QUALITY"), 90u32)?;
    if !(1..=100).contains(&jpeg_quality) {
        return Err(ConfigError::JpegQuality(jpeg_quality));
    }

    let resolution = match get("SIZE") {
        Some(s) => s.parse()?,
        None => Resolution {
            width: 1280,
            height: 720,
        },
    };

    let policy = SamplingPolicy::new(
        parse_or("PCTG", get("PCTG"), 5)?,
        parse_or("HOURSTART", get("HOURSTART"), 9)?,
        parse_or("HOURSTOP", get("HOURSTOP"), 17)?,
        parse_or("MAX_IDLE_MINUTES", get("MAX_IDLE_MINUTES"), 10)?,
    )?;

    let secs = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
        parse_or(key, get(key), default).map(Duration::from_secs)
    };

    let reaction_delay = secs("REACTION_SECS", 3)?;
    let flood_guard_delay = secs("FLOOD_GUARD_SECS", 5)?;
    // Snapshot names have one-second resolution.
    let spacing = reaction_delay.saturating_add(flood_guard_delay);
    if spacing < MIN_CAPTURE_SPACING {
        return Err(ConfigError::CaptureSpacing(spacing));
    }

    Ok(Config {
        save_dir,
        jpeg_quality: jpeg_quality as u8,
        camera: get("CAMERA").unwrap_or_else(|| "/dev/video0".into()),
        input_format: get("INPUT_FORMAT").unwrap_or_else(|| "v4l2".into()),
        resolution,
        policy,
        warmup: secs("WARMUP_SECS", 60)?,
        reaction_delay,
        flood_guard_delay,
        notifications: parse_bool("NOTIFICATIONS", get("NOTIFICATIONS"), true)?,
        status_file: get("STATUS_FILE").filter(|s| !s.is_empty()).map(PathBuf::from),
        control_listen_addr: match get("CONTROL_LISTEN_ADDR") {
            Some(addr) if addr.is_empty() => None,
            Some(addr) => Some(addr),
            None => Some("127.0.0.1:8090".into()),
        },
    })
}

fn parse_or<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Parse {
            key,
            value: v,
            expected: "a non-negative integer",
        }),
    }
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(v) = value else {
        return Ok(default);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Parse {
            key,
            value: v,
            expected: "a boolean",
        }),
    }
}

/// Parse `KEY=VALUE` lines into a map, stripping optional double-quotes.
fn parse_conf(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let val = val.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

// ─── tests ───────────────────────────────────────────────────────────────
