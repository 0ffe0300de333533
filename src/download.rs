//! Saving the current image to disk.

use crate::error::Result;
use crate::image::GeneratedImage;
use std::path::{Path, PathBuf};

/// Returns the download file name for the given epoch milliseconds.
pub fn download_file_name(epoch_millis: i64) -> String {
    format!("gemini-gen-{epoch_millis}.png")
}

/// Writes the image's decoded payload to `dir`, named after the current
/// time. Returns the written path.
pub async fn save_image(image: &GeneratedImage, dir: impl AsRef<Path>) -> Result<PathBuf> {
    save_image_at(image, dir, chrono::Utc::now().timestamp_millis()).await
}

/// Like [`save_image`] with an explicit timestamp.
pub async fn save_image_at(
    image: &GeneratedImage,
    dir: impl AsRef<Path>,
    epoch_millis: i64,
) -> Result<PathBuf> {
    let bytes = image.payload()?.decode()?;
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(download_file_name(epoch_millis));
    tokio::fs::write(&path, &bytes).await?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "saved image");
    Ok(path)
}
