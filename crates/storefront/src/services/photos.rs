//! Store photo processing.
//!
//! Uploads are decoded, shrunk to the configured maximum width (aspect ratio
//! kept, never enlarged) and written to the uploads directory under a random
//! name. Decoding and encoding run on the blocking pool.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use image::imageops::FilterType;
use thiserror::Error;
use uuid::Uuid;

/// Errors from photo processing.
#[derive(Debug, Error)]
pub enum PhotoError {
    /// The upload is not an image type we can handle.
    #[error("That filetype isn't allowed!")]
    NotAnImage(String),

    /// The bytes could not be decoded or re-encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Writing to the uploads directory failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking task panicked or was cancelled.
    #[error("photo task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PhotoError {
    /// Whether the upload itself was at fault, as opposed to the server.
    #[must_use]
    pub const fn is_bad_upload(&self) -> bool {
        matches!(
            self,
            Self::NotAnImage(_)
                | Self::Image(
                    image::ImageError::Decoding(_)
                        | image::ImageError::Unsupported(_)
                        | image::ImageError::Limits(_)
                )
        )
    }
}

/// Turns an uploaded file into a stored photo.
#[async_trait]
pub trait PhotoProcessor: Send + Sync {
    /// Store `bytes` and return the filename to record on the store.
    async fn process(&self, bytes: Bytes, content_type: &str) -> Result<String, PhotoError>;

    /// Remove a photo returned by `process` that ended up unused.
    async fn discard(&self, filename: &str) -> Result<(), PhotoError>;
}

/// Build the stored filename for an upload, `<uuid>.<mime subtype>`.
///
/// # Errors
///
/// Returns `PhotoError::NotAnImage` unless `content_type` is a supported
/// `image/*` type.
pub fn photo_filename(content_type: &str) -> Result<(String, ImageFormat), PhotoError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let format = mime
        .strip_prefix("image/")
        .and_then(|_| ImageFormat::from_mime_type(&mime))
        .filter(|f| f.reading_enabled() && f.writing_enabled())
        .ok_or_else(|| PhotoError::NotAnImage(content_type.to_string()))?;

    let extension = mime.trim_start_matches("image/");
    Ok((format!("{}.{extension}", Uuid::new_v4()), format))
}

/// Writes resized photos to a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskPhotoProcessor {
    dir: PathBuf,
    max_width: u32,
}

impl DiskPhotoProcessor {
    #[must_use]
    pub const fn new(dir: PathBuf, max_width: u32) -> Self {
        Self { dir, max_width }
    }
}

#[async_trait]
impl PhotoProcessor for DiskPhotoProcessor {
    async fn process(&self, bytes: Bytes, content_type: &str) -> Result<String, PhotoError> {
        let (filename, format) = photo_filename(content_type)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(&filename);
        let max_width = self.max_width;
        tokio::task::spawn_blocking(move || -> Result<(), PhotoError> {
            let mut image = image::load_from_memory_with_format(&bytes, format)?;
            if image.width() > max_width {
                image = image.resize(max_width, u32::MAX, FilterType::Lanczos3);
            }
            image.save_with_format(&path, format)?;
            Ok(())
        })
        .await??;

        tracing::info!(%filename, "photo stored");
        Ok(filename)
    }

    async fn discard(&self, filename: &str) -> Result<(), PhotoError> {
        tokio::fs::remove_file(self.dir.join(filename)).await?;
        tracing::info!(%filename, "photo discarded");
        Ok(())
    }
}
