//! Snapshot persistence – JPEG files under the save root.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

use crate::error::StoreError;
use crate::sensor::Image;

/// Persists images and prepares the directories they go into.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create `dir` and any missing parents.
    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError>;

    /// Write `image` to `path`. On failure nothing is left at `path`.
    async fn save(&self, image: &Image, path: &Path) -> Result<(), StoreError>;
}

/// Writes JPEGs to the local filesystem.
pub struct FsStore {
    quality: u8,
}

impl FsStore {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }
}

#[async_trait]
impl Store for FsStore {
    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })
    }

    async fn save(&self, image: &Image, path: &Path) -> Result<(), StoreError> {
        // JPEG has no alpha channel; convert before handing off to the worker.
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let quality = self.quality;
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_jpeg(&rgb, &target, quality))
            .await
            .map_err(|e| StoreError::Worker {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}

/// Encode into `<path>.part` and rename into place, so readers never see a
/// half-written snapshot. An existing snapshot at `path` is never replaced.
fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), StoreError> {
    let partial = partial_path(path);

    let result = encode_to(image, &partial, quality)
        .and_then(|()| refuse_existing(path))
        .and_then(|()| {
            std::fs::rename(&partial, path).map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })
        });
    if result.is_err() {
        std::fs::remove_file(&partial).ok();
    } else {
        debug!("Wrote {}", path.display());
    }
    result
}

fn refuse_existing(path: &Path) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if path.try_exists().map_err(write_err)? {
        return Err(write_err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "snapshot already exists",
        )));
    }
    Ok(())
}

fn encode_to(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::create(path).map_err(write_err)?;
    let mut writer = std::io::BufWriter::new(file);
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
        .map_err(|source| StoreError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(write_err)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
