use crate::token::TokenCache;
use crate::traits::PlatformApi;
use crate::types::{Credentials, MediaRef, MediaUpload, PublisherError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Largest cover image the platform accepts as permanent material.
pub const MAX_COVER_BYTES: u64 = 1024 * 1024;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Uploads cover images as permanent material.
pub struct MediaUploader {
    api: Arc<dyn PlatformApi>,
    tokens: Arc<TokenCache>,
}

impl MediaUploader {
    pub fn new(api: Arc<dyn PlatformApi>, tokens: Arc<TokenCache>) -> Self {
        Self { api, tokens }
    }

    pub async fn upload_cover(&self, credentials: &Credentials, path: &Path) -> Result<MediaRef> {
        let upload = load_cover(path).await?;
        let token = self.tokens.get_token(credentials).await?;

        let media = self.api.upload_media(&token.value, upload).await?;
        info!("Uploaded cover {} as {}", path.display(), media.media_id);
        Ok(media)
    }
}

/// Read and check a cover file. No network access.
pub async fn load_cover(path: &Path) -> Result<MediaUpload> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| PublisherError::validation(format!("cover image not found: {}", path.display())))?;

    if !metadata.is_file() {
        return Err(PublisherError::validation(format!(
            "cover image is not a regular file: {}",
            path.display()
        )));
    }

    if metadata.len() > MAX_COVER_BYTES {
        return Err(PublisherError::validation(format!(
            "cover image is {} bytes, limit is {} bytes: {}",
            metadata.len(),
            MAX_COVER_BYTES,
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PublisherError::validation(format!(
            "unsupported cover image format {:?}, expected one of {}",
            extension,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("cover.jpg")
        .to_string();

    debug!("Loaded cover {} ({} bytes)", file_name, bytes.len());

    Ok(MediaUpload {
        file_name,
        content_type: content_type_for(&extension).to_string(),
        bytes,
    })
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxFailure, SandboxPlatform};
    use crate::types::PlatformOp;
    use std::io::Write;
    use tempfile::{Builder, TempDir};

    fn image_file(dir: &TempDir, name: &str, size: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; size]).unwrap();
        path
    }

    fn uploader(sandbox: &Arc<SandboxPlatform>) -> MediaUploader {
        let tokens = Arc::new(TokenCache::new(sandbox.clone()));
        MediaUploader::new(sandbox.clone(), tokens)
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("PNG"), "image/png");
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for("webp"), "image/webp");
        assert_eq!(content_type_for("gif"), "image/gif");
        assert_eq!(content_type_for("bmp"), "image/jpeg");
    }

    #[tokio::test]
    async fn rejects_missing_directory_oversized_and_unsupported() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("nope.png");
        assert!(matches!(load_cover(&missing).await, Err(PublisherError::Validation(_))));

        assert!(matches!(load_cover(dir.path()).await, Err(PublisherError::Validation(_))));

        let big = image_file(&dir, "big.png", (MAX_COVER_BYTES + 1) as usize);
        let err = load_cover(&big).await.unwrap_err();
        assert!(err.to_string().contains("limit"));

        let bmp = image_file(&dir, "cover.bmp", 10);
        assert!(matches!(load_cover(&bmp).await, Err(PublisherError::Validation(_))));
    }

    #[tokio::test]
    async fn accepts_limit_sized_file_with_uppercase_extension() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "COVER.JPG", MAX_COVER_BYTES as usize);

        let upload = load_cover(&path).await.unwrap();
        assert_eq!(upload.file_name, "COVER.JPG");
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.bytes.len() as u64, MAX_COVER_BYTES);
    }

    #[tokio::test]
    async fn invalid_file_never_reaches_platform() {
        let sandbox = Arc::new(SandboxPlatform::new());
        let uploader = uploader(&sandbox);
        let file = Builder::new().suffix(".txt").tempfile().unwrap();

        let result = uploader.upload_cover(&Credentials::new("wx1", "s"), file.path()).await;
        assert!(matches!(result, Err(PublisherError::Validation(_))));
        assert!(sandbox.calls().is_empty());
    }

    #[tokio::test]
    async fn uploads_valid_cover() {
        let sandbox = Arc::new(SandboxPlatform::new());
        let uploader = uploader(&sandbox);
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "cover.webp", 512);

        let media = uploader.upload_cover(&Credentials::new("wx1", "s"), &path).await.unwrap();
        assert!(media.media_id.starts_with("sandbox_cover_"));
        assert_eq!(sandbox.calls(), vec![PlatformOp::FetchToken, PlatformOp::UploadMedia]);
        assert_eq!(sandbox.uploads()[0].content_type, "image/webp");
    }

    #[tokio::test]
    async fn platform_rejection_is_upload_error() {
        let sandbox = Arc::new(SandboxPlatform::new().failing(
            PlatformOp::UploadMedia,
            SandboxFailure::Platform {
                code: 40005,
                message: "invalid file type".to_string(),
            },
        ));
        let uploader = uploader(&sandbox);
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, "cover.png", 64);

        let err = uploader.upload_cover(&Credentials::new("wx1", "s"), &path).await.unwrap_err();
        assert!(matches!(
            err,
            PublisherError::Platform { operation: PlatformOp::UploadMedia, code: 40005, .. }
        ));
    }
}
