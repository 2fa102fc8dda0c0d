use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use image::{ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image is {0} bytes, the limit is {1}")]
    TooLarge(u64, u64),
    #[error("Image is {width}x{height}px, the limit is {max}px per side")]
    TooWide { width: u32, height: u32, max: u32 },
    #[error("Unsupported or corrupt image data")]
    InvalidFormat,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Content-addressed image files under one directory, served from
/// `url_prefix`.
#[derive(Debug, Clone)]
pub struct ImageService {
    images_dir: PathBuf,
    url_prefix: String,
    max_bytes: u64,
    max_dimension: u32,
}

impl ImageService {
    pub fn new(
        images_dir: PathBuf,
        url_prefix: impl Into<String>,
        max_bytes: u64,
        max_dimension: u32,
    ) -> Result<Self, ImageError> {
        std::fs::create_dir_all(&images_dir)?;
        Ok(Self {
            images_dir,
            url_prefix: url_prefix.into(),
            max_bytes,
            max_dimension,
        })
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Checks size, format and dimensions, then stores `data` as
    /// `<sha256>.<ext>` and returns its public URL.
    pub async fn store(&self, data: &[u8]) -> Result<String, ImageError> {
        let size = data.len() as u64;
        if size > self.max_bytes {
            return Err(ImageError::TooLarge(size, self.max_bytes));
        }

        let format = image::guess_format(data).map_err(|_| ImageError::InvalidFormat)?;
        let (width, height) = ImageReader::with_format(Cursor::new(data), format)
            .into_dimensions()
            .map_err(|_| ImageError::InvalidFormat)?;
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ImageError::TooWide {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let file_name = format!("{:x}.{}", Sha256::digest(data), extension(format));
        let path = self.images_dir.join(&file_name);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(file = %file_name, "Image already stored");
        } else {
            tokio::fs::write(&path, data).await?;
            tracing::info!(file = %file_name, size, width, height, "Stored image");
        }
        Ok(format!("{}/{}", self.url_prefix, file_name))
    }
}

fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}
