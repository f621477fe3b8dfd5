use crate::types::{
    ArticleDraft, IssuedToken, MediaRef, MediaUpload, PublishStatusPayload, PublisherError, Result,
    SubmitReceipt,
};
use async_trait::async_trait;
use std::path::Path;

/// The platform's remote procedures.
///
/// Every method must check the embedded application code of the response and
/// return [`PublisherError::Platform`] for a non-zero code, even when the
/// transport succeeded. Transport failures are [`PublisherError::Network`].
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Human-readable name for logs
    fn platform_name(&self) -> String;

    async fn fetch_token(&self, app_id: &str, app_secret: &str) -> Result<IssuedToken>;

    /// Upload an image as permanent material
    async fn upload_media(&self, access_token: &str, upload: MediaUpload) -> Result<MediaRef>;

    /// Create a draft and return its media id
    async fn create_draft(&self, access_token: &str, article: &ArticleDraft) -> Result<String>;

    async fn submit_publish(&self, access_token: &str, media_id: &str) -> Result<SubmitReceipt>;

    /// Create the transient news media used by previews
    async fn create_preview_media(&self, access_token: &str, article: &ArticleDraft) -> Result<String>;

    /// Deliver a preview to one follower and return the message id
    async fn send_preview(&self, access_token: &str, recipient: &str, media_id: &str) -> Result<Option<String>>;

    async fn fetch_publish_status(&self, access_token: &str, publish_id: &str) -> Result<PublishStatusPayload>;
}

/// Turns caller content (Markdown or HTML) into platform HTML.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, content: &str) -> String;
}

/// Something the orchestrator did that a caller may want to see.
#[derive(Debug)]
pub enum PublishEvent<'a> {
    CoverUploaded {
        media_id: &'a str,
    },
    CoverSkipped {
        path: &'a Path,
        error: &'a PublisherError,
    },
    DraftCreated {
        media_id: &'a str,
    },
    Submitted {
        publish_id: &'a str,
        msg_id: Option<&'a str>,
    },
    ConfirmationFailed {
        attempt: u32,
        error: &'a PublisherError,
    },
    UrlResolved {
        publish_id: &'a str,
        url: &'a str,
        confirmed: bool,
    },
    PreviewSent {
        recipient: &'a str,
        msg_id: Option<&'a str>,
    },
}

/// Observability capability handed to the publisher.
pub trait PublishObserver: Send + Sync {
    fn record(&self, event: &PublishEvent<'_>);
}
