use crate::traits::PlatformApi;
use crate::types::{
    ArticleDetail, ArticleDraft, ArticleItem, ArticleStat, IssuedToken, MediaRef, MediaUpload,
    PlatformOp, PublishStatusPayload, PublisherError, Result, SubmitReceipt,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

pub const SANDBOX_ARTICLE_BASE: &str = "https://mp.weixin.qq.com/s/";

/// A scripted failure for one platform operation.
#[derive(Debug, Clone)]
pub enum SandboxFailure {
    /// The platform answers with a non-zero errcode
    Platform { code: i64, message: String },
    /// The call never gets an answer
    Network(String),
}

/// In-memory platform used for sandbox mode and as a test double.
///
/// It never opens a socket. Identifiers are fabricated with a fixed shape
/// (`sandbox_<kind>_<32 hex>`) unless pinned with the `with_*` builders, and
/// every call is recorded so callers can assert on the sequence.
pub struct SandboxPlatform {
    name: String,
    state: Mutex<SandboxState>,
}

#[derive(Default)]
struct SandboxState {
    calls: Vec<PlatformOp>,
    failures: HashMap<PlatformOp, SandboxFailure>,
    token_ttl_seconds: i64,
    issued_tokens: u32,
    draft_media_id: Option<String>,
    publish_id: Option<String>,
    msg_data_id: Option<String>,
    status: Option<PublishStatusPayload>,
    drafts: Vec<ArticleDraft>,
    uploads: Vec<MediaUpload>,
    previews: Vec<(String, String)>,
}

impl SandboxPlatform {
    pub fn new() -> Self {
        Self {
            name: "sandbox".to_string(),
            state: Mutex::new(SandboxState {
                token_ttl_seconds: 7200,
                ..Default::default()
            }),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    pub fn with_token_ttl(self, seconds: i64) -> Self {
        self.lock().token_ttl_seconds = seconds;
        self
    }

    pub fn with_draft_media_id(self, media_id: impl Into<String>) -> Self {
        self.lock().draft_media_id = Some(media_id.into());
        self
    }

    pub fn with_publish_ids(self, publish_id: impl Into<String>, msg_data_id: impl Into<String>) -> Self {
        {
            let mut state = self.lock();
            state.publish_id = Some(publish_id.into());
            state.msg_data_id = Some(msg_data_id.into());
        }
        self
    }

    /// Answer every status query with this payload.
    pub fn with_status(self, status: PublishStatusPayload) -> Self {
        self.lock().status = Some(status);
        self
    }

    pub fn failing(self, operation: PlatformOp, failure: SandboxFailure) -> Self {
        self.lock().failures.insert(operation, failure);
        self
    }

    /// Operations invoked so far, in order.
    pub fn calls(&self) -> Vec<PlatformOp> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: PlatformOp) -> usize {
        self.lock().calls.iter().filter(|op| **op == operation).count()
    }

    pub fn drafts(&self) -> Vec<ArticleDraft> {
        self.lock().drafts.clone()
    }

    pub fn uploads(&self) -> Vec<MediaUpload> {
        self.lock().uploads.clone()
    }

    /// `(recipient, media_id)` pairs delivered as previews.
    pub fn previews(&self) -> Vec<(String, String)> {
        self.lock().previews.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SandboxState> {
        // A panicking test thread must not wedge the other assertions.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call and apply any scripted failure.
    fn enter(&self, operation: PlatformOp) -> Result<MutexGuard<'_, SandboxState>> {
        let mut state = self.lock();
        state.calls.push(operation);
        debug!("[{}] {}", self.name, operation);

        let failure = state.failures.get(&operation).cloned();
        match failure {
            Some(SandboxFailure::Platform { code, message }) => Err(PublisherError::platform(operation, code, message)),
            Some(SandboxFailure::Network(message)) => Err(PublisherError::network(operation, message)),
            None => Ok(state),
        }
    }
}

impl Default for SandboxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn fabricate(kind: &str) -> String {
    format!("sandbox_{}_{}", kind, Uuid::new_v4().simple())
}

pub fn sandbox_article_url(publish_id: &str) -> String {
    format!("{}{}", SANDBOX_ARTICLE_BASE, publish_id)
}

#[async_trait]
impl PlatformApi for SandboxPlatform {
    fn platform_name(&self) -> String {
        format!("Sandbox platform ({})", self.name)
    }

    async fn fetch_token(&self, app_id: &str, _app_secret: &str) -> Result<IssuedToken> {
        let mut state = self.enter(PlatformOp::FetchToken)?;
        state.issued_tokens += 1;
        Ok(IssuedToken {
            access_token: format!("sandbox_token_{}_{}", app_id, state.issued_tokens),
            expires_in: state.token_ttl_seconds,
        })
    }

    async fn upload_media(&self, _access_token: &str, upload: MediaUpload) -> Result<MediaRef> {
        let mut state = self.enter(PlatformOp::UploadMedia)?;
        let media_id = fabricate("cover");
        let url = format!("https://mmbiz.qpic.cn/sandbox/{}/{}", media_id, upload.file_name);
        state.uploads.push(upload);
        Ok(MediaRef {
            media_id,
            url: Some(url),
        })
    }

    async fn create_draft(&self, _access_token: &str, article: &ArticleDraft) -> Result<String> {
        let mut state = self.enter(PlatformOp::CreateDraft)?;
        state.drafts.push(article.clone());
        Ok(state.draft_media_id.clone().unwrap_or_else(|| fabricate("media")))
    }

    async fn submit_publish(&self, _access_token: &str, _media_id: &str) -> Result<SubmitReceipt> {
        let state = self.enter(PlatformOp::SubmitPublish)?;
        Ok(SubmitReceipt {
            publish_id: state.publish_id.clone().unwrap_or_else(|| fabricate("publish")),
            msg_data_id: Some(state.msg_data_id.clone().unwrap_or_else(|| fabricate("msg"))),
        })
    }

    async fn create_preview_media(&self, _access_token: &str, article: &ArticleDraft) -> Result<String> {
        let mut state = self.enter(PlatformOp::CreatePreviewMedia)?;
        state.drafts.push(article.clone());
        Ok(fabricate("news"))
    }

    async fn send_preview(&self, _access_token: &str, recipient: &str, media_id: &str) -> Result<Option<String>> {
        let mut state = self.enter(PlatformOp::SendPreview)?;
        state.previews.push((recipient.to_string(), media_id.to_string()));
        Ok(Some(fabricate("msg")))
    }

    async fn fetch_publish_status(&self, _access_token: &str, publish_id: &str) -> Result<PublishStatusPayload> {
        let state = self.enter(PlatformOp::FetchPublishStatus)?;
        if let Some(status) = &state.status {
            return Ok(status.clone());
        }

        Ok(PublishStatusPayload {
            publish_id: Some(publish_id.to_string()),
            publish_status: Some(0),
            article_id: Some(fabricate("article")),
            article_detail: Some(ArticleDetail {
                item: vec![ArticleItem {
                    idx: 1,
                    article_url: sandbox_article_url(publish_id),
                    is_deleted: false,
                }],
            }),
            fail_idx: Vec::new(),
            stat: Some(ArticleStat::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fabricated_ids_have_fixed_shape() {
        let sandbox = SandboxPlatform::new();
        let article = ArticleDraft {
            title: "t".to_string(),
            author: None,
            body_html: "<p>b</p>".to_string(),
            digest: "b".to_string(),
            cover_media_id: None,
            content_source_url: None,
            open_comment: false,
            fans_only_comment: false,
        };

        let media_id = sandbox.create_draft("tok", &article).await.unwrap();
        assert!(media_id.starts_with("sandbox_media_"));
        assert_eq!(media_id.len(), "sandbox_media_".len() + 32);

        let receipt = sandbox.submit_publish("tok", &media_id).await.unwrap();
        assert!(receipt.publish_id.starts_with("sandbox_publish_"));
        assert!(receipt.msg_data_id.unwrap().starts_with("sandbox_msg_"));

        assert_eq!(
            sandbox.calls(),
            vec![PlatformOp::CreateDraft, PlatformOp::SubmitPublish]
        );
    }

    #[tokio::test]
    async fn scripted_failure_is_recorded_and_returned() {
        let sandbox = SandboxPlatform::new().failing(
            PlatformOp::FetchToken,
            SandboxFailure::Network("connection refused".to_string()),
        );

        let result = sandbox.fetch_token("wx1", "secret").await;
        assert!(matches!(result, Err(PublisherError::Network { .. })));
        assert_eq!(sandbox.call_count(PlatformOp::FetchToken), 1);
    }

    #[tokio::test]
    async fn default_status_points_at_publish_id() {
        let sandbox = SandboxPlatform::new();
        let status = sandbox.fetch_publish_status("tok", "P9").await.unwrap();
        assert_eq!(status.publish_status, Some(0));
        let detail = status.article_detail.unwrap();
        assert_eq!(detail.item[0].article_url, "https://mp.weixin.qq.com/s/P9");
    }
}
