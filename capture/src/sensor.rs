//! Camera access – grabs a single frame by running `ffmpeg` as a child
//! process and decoding what it writes to stdout.

use std::process::Stdio;

use async_trait::async_trait;
use image::DynamicImage;
use tokio::process::Command;
use tracing::{debug, info};

use glimpse_common::config::{Config, Resolution};

use crate::error::SensorError;

/// A decoded still frame.
pub type Image = DynamicImage;

/// Produces one still image on demand.
#[async_trait]
pub trait Sensor: Send + Sync {
    async fn capture(&self) -> Result<Image, SensorError>;
}

/// Grabs frames from a video device through ffmpeg.
pub struct FfmpegSensor {
    program: String,
    device: String,
    input_format: String,
    resolution: Resolution,
}

impl FfmpegSensor {
    pub fn new(config: &Config) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            device: config.camera.clone(),
            input_format: config.input_format.clone(),
            resolution: config.resolution,
        }
    }

    /// Arguments for a single-frame grab written as PNG to stdout.
    fn args(&self) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-f".into(),
            self.input_format.clone(),
            "-video_size".into(),
            self.resolution.to_string(),
            "-i".into(),
            self.device.clone(),
            "-frames:v".into(),
            "1".into(),
            "-c:v".into(),
            "png".into(),
            "-f".into(),
            "image2pipe".into(),
            "-".into(),
        ]
    }
}

#[async_trait]
impl Sensor for FfmpegSensor {
    async fn capture(&self) -> Result<Image, SensorError> {
        let args = self.args();
        debug!("Spawning: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SensorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SensorError::Failed {
                program: self.program.clone(),
                device: self.device.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(SensorError::Empty {
                device: self.device.clone(),
            });
        }

        let image =
            image::load_from_memory(&output.stdout).map_err(|source| SensorError::Decode {
                device: self.device.clone(),
                source,
            })?;
        info!(
            "Grabbed {}x{} frame from {}",
            image.width(),
            image.height(),
            self.device
        );
        Ok(image)
    }
}
