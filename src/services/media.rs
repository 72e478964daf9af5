//! Uploaded post images
//!
//! Files live under `<media root>/posts_images/` with random names and are
//! referenced from posts by their path relative to the media root.

use crate::config::MediaConfig;
use anyhow::{Context, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Subdirectory of the media root that holds post images
pub const POST_IMAGES_DIR: &str = "posts_images";

/// An image file received from a form, not yet stored
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Stores and removes post images
pub struct MediaStore {
    config: MediaConfig,
}

impl MediaStore {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Media root on disk
    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Reasons the upload cannot be accepted, for display under the field
    ///
    /// Both the declared type and the type read from the file's leading
    /// bytes must be allowed.
    pub fn check(&self, image: &UploadedImage) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.config.is_type_allowed(&image.content_type) {
            problems.push(format!(
                "Upload a valid image. \"{}\" files are not accepted.",
                image.content_type
            ));
        } else if !image.data.is_empty()
            && !sniff_mime(&image.data).is_some_and(|mime| self.config.is_type_allowed(mime))
        {
            problems.push(
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                    .to_string(),
            );
        }
        if image.data.len() as u64 > self.config.max_file_size {
            problems.push(format!(
                "The file is too large. Maximum size is {} MB.",
                self.config.max_file_size / 1024 / 1024
            ));
        }
        if image.data.is_empty() {
            problems.push("The submitted file is empty.".to_string());
        }
        problems
    }

    /// Write the image and return its path relative to the media root
    pub async fn save(&self, image: &UploadedImage) -> Result<String> {
        let dir = self.config.path.join(POST_IMAGES_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory: {:?}", dir))?;

        // The client's filename never picks the extension ServeDir serves it by
        let mime = match sniff_mime(&image.data) {
            Some(mime) => mime,
            None => image.content_type.as_str(),
        };
        let ext = self.config.get_extension(mime);
        let relative = format!("{}/{}.{}", POST_IMAGES_DIR, Uuid::new_v4(), ext);
        let target = self.config.path.join(&relative);

        fs::write(&target, &image.data)
            .await
            .with_context(|| format!("Failed to save image: {:?}", target))?;

        tracing::debug!(path = %relative, size = image.data.len(), "Stored post image");
        Ok(relative)
    }

    /// Remove a stored image; missing files and unsafe paths are ignored
    pub async fn remove(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!(path = %relative, "Refusing to remove image outside media root");
            return;
        };
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %relative, error = %e, "Failed to remove image");
            }
        }
    }

    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        safe.then(|| self.config.path.join(path))
    }
}

/// MIME type of the image format recognised from the leading bytes
fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}
