//! Message image storage
//!
//! Uploaded files are validated as a batch first (count, extension, size)
//! and only then written to `upload_dir` as `<uuid><ext>`. Each stored file
//! is served back under `/uploads/<uuid><ext>`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::backend::messaging::db::NewImage;
use crate::shared::AppConfig;

/// Lowercase extensions accepted for message images
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// URL prefix under which `upload_dir` is served
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Too many images (max {max})")]
    TooMany { max: usize },

    #[error("Invalid file type for {filename}. Allowed: jpg, jpeg, png, gif")]
    InvalidExtension { filename: String },

    #[error("Image {filename} is too large (max {} MB)", .max / (1024 * 1024))]
    TooLarge { filename: String, max: usize },

    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Whether the upload itself was at fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// An image received in a multipart request, not yet written
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub original_filename: String,
    pub data: Bytes,
}

/// An image written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub record: NewImage,
}

/// Where and how message images are kept
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    max_images: usize,
    max_size: usize,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, max_images: usize, max_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_images,
            max_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.upload_dir.clone(),
            config.max_images_per_message,
            config.max_message_image_size,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Reject a count above the per-message maximum.
    pub fn check_count(&self, count: usize) -> Result<(), ImageError> {
        if count > self.max_images {
            return Err(ImageError::TooMany { max: self.max_images });
        }
        Ok(())
    }

    /// Validate a single file's name and size.
    pub fn check_image(&self, filename: &str, size: usize) -> Result<(), ImageError> {
        if extension_of(filename).is_none() {
            return Err(ImageError::InvalidExtension {
                filename: filename.to_string(),
            });
        }
        if size > self.max_size {
            return Err(ImageError::TooLarge {
                filename: filename.to_string(),
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Validate a whole batch before anything touches the disk.
    pub fn validate(&self, images: &[UploadedImage]) -> Result<(), ImageError> {
        self.check_count(images.len())?;
        for image in images {
            self.check_image(&image.original_filename, image.data.len())?;
        }
        Ok(())
    }

    /// Validate and write every image. Either all files are written or none
    /// remain on disk.
    pub async fn save_all(&self, images: &[UploadedImage]) -> Result<Vec<StoredImage>, ImageError> {
        self.validate(images)?;
        if images.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.dir).await?;

        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            match self.write_one(image).await {
                Ok(saved) => stored.push(saved),
                Err(e) => {
                    self.remove_all(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn write_one(&self, image: &UploadedImage) -> Result<StoredImage, ImageError> {
        let extension = extension_of(&image.original_filename).ok_or_else(|| ImageError::InvalidExtension {
            filename: image.original_filename.clone(),
        })?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.dir.join(&file_name);

        fs::write(&path, &image.data).await?;
        tracing::debug!("[Messaging] stored image {} ({} bytes)", file_name, image.data.len());

        Ok(StoredImage {
            path,
            record: NewImage {
                image_url: format!("{}/{}", UPLOAD_URL_PREFIX, file_name),
                original_filename: image.original_filename.clone(),
            },
        })
    }

    /// Best-effort removal of files written by [`save_all`](Self::save_all).
    pub async fn remove_all(&self, stored: &[StoredImage]) {
        for image in stored {
            if let Err(e) = fs::remove_file(&image.path).await {
                tracing::warn!("[Messaging] failed to remove {}: {}", image.path.display(), e);
            }
        }
    }
}

/// Lowercase extension of `filename` if it is an allowed image type.
pub fn extension_of(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.iter().copied().find(|allowed| *allowed == ext)
}

/// Drop any directory part a client put in the filename.
pub fn client_filename(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim().to_string()
}
