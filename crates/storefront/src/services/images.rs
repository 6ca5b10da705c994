//! Product image storage on the local filesystem.
//!
//! Uploaded files are written under the configured image directory with a
//! generated unique name and served back at [`IMAGE_URL_PREFIX`]. Products
//! store the public URL, never the filesystem path.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

/// Public URL prefix the image directory is mounted at.
pub const IMAGE_URL_PREFIX: &str = "/product_images";

/// Longest sanitized original filename kept in the stored name.
const MAX_NAME_LEN: usize = 64;

/// Errors from image storage.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Only PNG and JPEG uploads are accepted.
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    /// The upload had no bytes.
    #[error("image is empty")]
    Empty,

    /// The URL does not point into the image directory.
    #[error("not a product image: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An image accepted from a multipart upload, not yet written.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Check the declared type and extension.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::UnsupportedType` for anything but PNG or JPEG and
    /// `ImageError::Empty` for an empty body.
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let type_ok = matches!(
            self.content_type.as_str(),
            "image/png" | "image/jpeg" | "image/jpg"
        );
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let extension_ok = matches!(extension.as_deref(), Some("png" | "jpg" | "jpeg"));

        if type_ok && extension_ok {
            Ok(())
        } else {
            Err(ImageError::UnsupportedType(self.content_type.clone()))
        }
    }
}

/// Filesystem-backed image store.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory images are written to and served from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and write an upload, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns `ImageError` if the upload is rejected or cannot be written.
    pub async fn save(&self, upload: &ImageUpload) -> Result<String, ImageError> {
        upload.validate()?;

        let file_name = unique_file_name(&upload.file_name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), &upload.bytes).await?;

        tracing::info!(file = %file_name, bytes = upload.bytes.len(), "Stored product image");
        Ok(format!("{IMAGE_URL_PREFIX}/{file_name}"))
    }

    /// Delete the file behind a public image URL.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::InvalidUrl` for URLs outside the image directory
    /// and `ImageError::Io` if removal fails.
    pub async fn delete(&self, url: &str) -> Result<(), ImageError> {
        let path = self.path_for(url)?;
        tokio::fs::remove_file(&path).await?;
        tracing::info!(path = %path.display(), "Deleted product image");
        Ok(())
    }

    /// Delete an image in the background. Failures are logged.
    pub fn spawn_delete(&self, url: String) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.delete(&url).await {
                tracing::warn!(error = %e, url = %url, "Failed to delete product image");
            }
        });
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, ImageError> {
        let name = url
            .strip_prefix(IMAGE_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && !name.starts_with('.'))
            .ok_or_else(|| ImageError::InvalidUrl(url.to_string()))?;
        Ok(self.dir.join(name))
    }
}

/// `{timestamp}-{random}-{sanitized original name}`.
fn unique_file_name(original: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{timestamp}-{}-{}", &random[..8], sanitize_file_name(original))
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    // Keep the tail so the extension survives truncation
    let start = cleaned.len().saturating_sub(MAX_NAME_LEN);
    let tail = &cleaned[start..];
    if tail.is_empty() {
        "image".to_string()
    } else {
        tail.to_string()
    }
}
