//! Reading image files from disk.

use std::path::Path;

use crate::{EditorError, EditorResult, ImageFormat, ImagePayload};

/// Read an image file, rejecting it before reading if it is over `limit` bytes.
///
/// The format is taken from the file extension.
///
/// # Errors
///
/// Returns [`EditorError::InvalidOperation`] for unsupported extensions,
/// [`EditorError::FileTooLarge`] for oversized files and
/// [`EditorError::Io`] if the file cannot be read.
pub async fn read_image(path: impl AsRef<Path>, limit: usize) -> EditorResult<ImagePayload> {
    let path = path.as_ref();
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .ok_or_else(|| {
            EditorError::InvalidOperation(format!(
                "unsupported image file: {}",
                path.display()
            ))
        })?;

    let size = tokio::fs::metadata(path).await?.len();
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    if size > limit {
        return Err(EditorError::FileTooLarge { size, limit });
    }

    let payload = ImagePayload::new(format, tokio::fs::read(path).await?);
    // The file may have grown between the two calls.
    payload.check_size(limit)?;
    tracing::debug!(path = %path.display(), bytes = payload.len(), "Read image");
    Ok(payload)
}
