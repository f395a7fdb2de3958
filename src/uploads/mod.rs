//! Upload intake and ephemeral scratch storage
//!
//! Uploaded media is streamed to a scratch directory under a
//! collision-resistant name (`<uuid-v4><original-extension>`), handed to a
//! vendor forwarder exactly once, and deleted before the HTTP response is
//! sent. The size ceiling is enforced chunk-by-chunk while writing, so an
//! oversized upload is rejected before any vendor call and the partial
//! file is removed.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Errors that can occur during upload intake.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The multipart request carried no `file` field.
    #[error("No file uploaded")]
    Missing,

    /// The upload exceeded the configured size ceiling.
    #[error("File too large (max: {max} bytes)")]
    TooLarge { max: u64 },

    /// The multipart stream could not be read.
    #[error("invalid multipart request: {0}")]
    Malformed(String),

    /// Scratch-directory or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scratch store for uploaded media pending forwarding.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStore {
    /// Create a store rooted at `dir` with the given size ceiling.
    ///
    /// The directory itself is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    /// The configured size ceiling in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// The scratch directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stream one multipart field to disk and return the stored upload.
    ///
    /// Enforces the size ceiling incrementally; on any failure the partial
    /// file is removed before the error is returned.
    pub async fn store_field(&self, field: Field<'_>) -> Result<StoredUpload, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let original_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = field
            .content_type()
            .map(|s| s.to_string())
            .or_else(|| mime_from_extension(&original_name).map(|s| s.to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let path = self.dir.join(unique_filename(&original_name));

        match write_field(&path, field, self.max_bytes).await {
            Ok(size) => {
                tracing::debug!(
                    path = %path.display(),
                    original_name = %original_name,
                    mime_type = %mime_type,
                    size,
                    "Stored uploaded file"
                );
                Ok(StoredUpload {
                    path,
                    original_name,
                    mime_type,
                    size,
                    deleted: false,
                })
            }
            Err(e) => {
                // Never leave a partial file behind.
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %cleanup,
                        "Failed to remove partial upload"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Stream the field's chunks into `path`, returning the byte count.
async fn write_field(path: &Path, mut field: Field<'_>, max_bytes: u64) -> Result<u64, UploadError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut total: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        total += chunk.len() as u64;
        if total > max_bytes {
            return Err(UploadError::TooLarge { max: max_bytes });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(total)
}

/// An uploaded file on disk, pending forwarding.
///
/// The file is deleted by [`StoredUpload::discard`], which handlers call
/// unconditionally after the forwarder finishes. Dropping an undiscarded
/// upload deletes the file as a backstop so a panicking handler cannot
/// orphan scratch files.
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
    /// Filename as supplied by the client.
    pub original_name: String,
    /// MIME type from the multipart part, or inferred from the extension.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    deleted: bool,
}

impl StoredUpload {
    /// Path of the stored file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the stored file.
    ///
    /// A deletion failure is logged and swallowed; it must never mask the
    /// result or error being returned to the caller.
    pub async fn discard(mut self) {
        self.deleted = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to delete uploaded file"
            );
        }
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        if !self.deleted {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to delete uploaded file on drop"
                );
            }
        }
    }
}

/// Generate a collision-resistant filename preserving the original
/// extension, so downstream content-type inference keeps working.
fn unique_filename(original_name: &str) -> String {
    match Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
    {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Infer a MIME type from a filename extension for the media types the
/// detection vendors accept.
fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== filename tests ====================

    #[test]
    fn test_unique_filename_preserves_extension() {
        let name = unique_filename("holiday photo.JPG");
        assert!(name.ends_with(".JPG"));
        // uuid (36 chars) + "." + ext
        assert_eq!(name.len(), 36 + 1 + 3);
    }

    #[test]
    fn test_unique_filename_without_extension() {
        let name = unique_filename("upload");
        assert_eq!(name.len(), 36);
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_unique_filenames_do_not_collide() {
        let a = unique_filename("a.png");
        let b = unique_filename("a.png");
        assert_ne!(a, b);
    }

    // ==================== mime inference tests ====================

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension("selfie.jpeg"), Some("image/jpeg"));
        assert_eq!(mime_from_extension("clip.MP4"), Some("video/mp4"));
        assert_eq!(mime_from_extension("scan.webp"), Some("image/webp"));
        assert_eq!(mime_from_extension("notes.txt"), None);
        assert_eq!(mime_from_extension("no_extension"), None);
    }

    // ==================== StoredUpload cleanup tests ====================

    #[tokio::test]
    async fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        tokio::fs::write(&path, b"data").await.unwrap();

        let upload = StoredUpload {
            path: path.clone(),
            original_name: "a.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            size: 4,
            deleted: false,
        };
        upload.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_file_as_backstop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bin");
        tokio::fs::write(&path, b"data").await.unwrap();

        {
            let _upload = StoredUpload {
                path: path.clone(),
                original_name: "b.bin".to_string(),
                mime_type: "application/octet-stream".to_string(),
                size: 4,
                deleted: false,
            };
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = StoredUpload {
            path: dir.path().join("never-written.bin"),
            original_name: "never-written.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            size: 0,
            deleted: false,
        };
        // Must not panic; failure is logged only.
        upload.discard().await;
    }
}
