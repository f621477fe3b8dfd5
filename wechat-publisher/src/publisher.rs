use crate::client::WeChatApi;
use crate::config::PublisherConfig;
use crate::digest::{extract_digest, truncate_chars, MAX_DIGEST_CHARS};
use crate::media::MediaUploader;
use crate::observer::TracingObserver;
use crate::render::BasicMarkdownRenderer;
use crate::sandbox::SandboxPlatform;
use crate::status::StatusQuery;
use crate::token::TokenCache;
use crate::traits::{ContentRenderer, PlatformApi, PublishEvent, PublishObserver};
use crate::types::{
    ArticleDraft, Credentials, PlatformOp, PreviewReceipt, PublishOutcome, PublishRecord, PublishRequest,
    PublishState, PublisherError, Result, StatusRequest, StatusSnapshot,
};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Wait after submission before the first status query. The platform does
/// not report the article URL synchronously.
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Status queries made while resolving the article URL.
pub const CONFIRMATION_ATTEMPTS: u32 = 3;

const CONFIRMATION_INTERVAL: Duration = Duration::from_secs(2);

pub const MAX_TITLE_CHARS: usize = 64;
pub const MAX_AUTHOR_CHARS: usize = 8;

const ARTICLE_URL_BASE: &str = "https://mp.weixin.qq.com/s/";

/// URL used when the platform never reported one. It may not resolve.
pub fn fallback_article_url(publish_id: &str) -> String {
    format!("{}{}", ARTICLE_URL_BASE, publish_id)
}

struct Resolution {
    url: String,
    confirmed: bool,
    state: PublishState,
}

/// Drives an article from request to published (or previewed) item.
///
/// One instance owns one token cache and may be shared across tasks.
pub struct ArticlePublisher {
    api: Arc<dyn PlatformApi>,
    tokens: Arc<TokenCache>,
    media: MediaUploader,
    status: StatusQuery,
    renderer: Arc<dyn ContentRenderer>,
    observer: Arc<dyn PublishObserver>,
}

impl ArticlePublisher {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        let tokens = Arc::new(TokenCache::new(api.clone()));
        Self {
            media: MediaUploader::new(api.clone(), tokens.clone()),
            status: StatusQuery::new(api.clone(), tokens.clone()),
            api,
            tokens,
            renderer: Arc::new(BasicMarkdownRenderer::new()),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Pick the live API or the sandbox once, from configuration.
    pub fn from_config(config: &PublisherConfig) -> Result<Self> {
        let api: Arc<dyn PlatformApi> = if config.sandbox {
            info!("Sandbox mode enabled, no requests will reach the platform");
            Arc::new(SandboxPlatform::new())
        } else {
            Arc::new(WeChatApi::new(config.clone())?)
        };
        Ok(Self::new(api))
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ContentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PublishObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn platform_name(&self) -> String {
        self.api.platform_name()
    }

    /// Publish the article, or send a preview when the request asks for one.
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        validate_request(request)?;

        let created_at = Utc::now();
        let credentials = &request.credentials;
        let cover_media_id = self.upload_cover(request).await;
        let draft = self.assemble_draft(request, cover_media_id);

        if request.preview_mode {
            let recipient = request.preview_recipient.as_deref().unwrap_or_default().trim();
            return self
                .send_preview(credentials, recipient, &draft)
                .await
                .map(PublishOutcome::Previewed);
        }

        info!("Publishing \"{}\" via {}", draft.title, self.api.platform_name());
        let token = self.tokens.get_token(credentials).await?;

        let media_id = self
            .checked(credentials, self.api.create_draft(&token.value, &draft).await)
            .await?;
        self.observer.record(&PublishEvent::DraftCreated { media_id: &media_id });

        let receipt = self
            .checked(credentials, self.api.submit_publish(&token.value, &media_id).await)
            .await?;
        if receipt.publish_id.trim().is_empty() {
            return Err(PublisherError::UnexpectedResponse {
                operation: PlatformOp::SubmitPublish,
                message: "empty publish_id".to_string(),
            });
        }
        let submitted_at = Utc::now();
        self.observer.record(&PublishEvent::Submitted {
            publish_id: &receipt.publish_id,
            msg_id: receipt.msg_data_id.as_deref(),
        });

        let resolution = self.resolve_url(credentials, &receipt.publish_id).await;
        self.observer.record(&PublishEvent::UrlResolved {
            publish_id: &receipt.publish_id,
            url: &resolution.url,
            confirmed: resolution.confirmed,
        });

        Ok(PublishOutcome::Published(PublishRecord {
            media_id,
            publish_id: receipt.publish_id,
            msg_id: receipt.msg_data_id,
            article_url: resolution.url,
            url_confirmed: resolution.confirmed,
            state: resolution.state,
            cover_media_id: draft.cover_media_id,
            created_at,
            submitted_at,
            resolved_at: Utc::now(),
        }))
    }

    pub async fn query_status(&self, request: &StatusRequest) -> Result<StatusSnapshot> {
        if request.credentials.is_blank() {
            return Err(PublisherError::validation("app_id and app_secret are required"));
        }
        self.status.query_status(&request.credentials, &request.id).await
    }

    async fn send_preview(
        &self,
        credentials: &Credentials,
        recipient: &str,
        draft: &ArticleDraft,
    ) -> Result<PreviewReceipt> {
        info!("Sending preview of \"{}\" to {}", draft.title, recipient);
        let token = self.tokens.get_token(credentials).await?;

        let media_id = self
            .checked(credentials, self.api.create_preview_media(&token.value, draft).await)
            .await?;
        let msg_id = self
            .checked(credentials, self.api.send_preview(&token.value, recipient, &media_id).await)
            .await?;

        self.observer.record(&PublishEvent::PreviewSent {
            recipient,
            msg_id: msg_id.as_deref(),
        });

        Ok(PreviewReceipt {
            recipient: recipient.to_string(),
            media_id,
            msg_id,
            cover_media_id: draft.cover_media_id.clone(),
            sent_at: Utc::now(),
        })
    }

    /// A failed cover never fails the article.
    async fn upload_cover(&self, request: &PublishRequest) -> Option<String> {
        let path = request
            .cover_image_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())?;
        let path = Path::new(path);

        match self.media.upload_cover(&request.credentials, path).await {
            Ok(media) => {
                self.observer.record(&PublishEvent::CoverUploaded {
                    media_id: &media.media_id,
                });
                Some(media.media_id)
            }
            Err(error) => {
                self.observer.record(&PublishEvent::CoverSkipped { path, error: &error });
                None
            }
        }
    }

    fn assemble_draft(&self, request: &PublishRequest, cover_media_id: Option<String>) -> ArticleDraft {
        let body_html = self.renderer.render(&request.content);
        let digest = match non_blank(request.digest.as_deref()) {
            Some(digest) => truncate_chars(digest, MAX_DIGEST_CHARS),
            None => extract_digest(&body_html),
        };
        debug!("Digest: {}", digest);

        ArticleDraft {
            title: request.title.trim().to_string(),
            author: non_blank(request.author.as_deref()).map(String::from),
            body_html,
            digest,
            cover_media_id,
            content_source_url: non_blank(request.source_url.as_deref()).map(String::from),
            open_comment: request.open_comment,
            fans_only_comment: request.fans_only_comment,
        }
    }

    /// Settle, then poll status a bounded number of times for the URL.
    async fn resolve_url(&self, credentials: &Credentials, publish_id: &str) -> Resolution {
        tokio::time::sleep(SETTLE_DELAY).await;

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: CONFIRMATION_INTERVAL,
            initial_interval: CONFIRMATION_INTERVAL,
            max_interval: CONFIRMATION_INTERVAL * 4,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut state = PublishState::Pending;
        for attempt in 1..=CONFIRMATION_ATTEMPTS {
            match self.status.query_status(credentials, publish_id).await {
                Ok(snapshot) => {
                    state = snapshot.state;
                    if let Some(url) = snapshot.primary_url() {
                        return Resolution {
                            url: url.to_string(),
                            confirmed: true,
                            state,
                        };
                    }
                    if state.is_terminal() {
                        debug!("Publish {} reached {} without a URL", publish_id, state);
                        break;
                    }
                }
                Err(error) => {
                    self.observer.record(&PublishEvent::ConfirmationFailed {
                        attempt,
                        error: &error,
                    });
                }
            }

            if attempt < CONFIRMATION_ATTEMPTS {
                if let Some(delay) = backoff.next_backoff() {
                    debug!("Checking {} again in {:?}", publish_id, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Resolution {
            url: fallback_article_url(publish_id),
            confirmed: false,
            state,
        }
    }

    /// Drop the cached token when the platform says it was not accepted.
    async fn checked<T>(&self, credentials: &Credentials, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            if TokenCache::is_token_rejection(error) {
                self.tokens.invalidate(&credentials.app_id).await;
            }
        }
        result
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Cross-field checks done before any network call.
pub fn validate_request(request: &PublishRequest) -> Result<()> {
    if request.credentials.is_blank() {
        return Err(PublisherError::validation("app_id and app_secret are required"));
    }

    let title = request.title.trim();
    if title.is_empty() {
        return Err(PublisherError::validation("title is required"));
    }
    let title_chars = title.chars().count();
    if title_chars > MAX_TITLE_CHARS {
        return Err(PublisherError::validation(format!(
            "title is {} characters, limit is {}",
            title_chars, MAX_TITLE_CHARS
        )));
    }

    if request.content.trim().is_empty() {
        return Err(PublisherError::validation("content is required"));
    }

    if let Some(author) = non_blank(request.author.as_deref()) {
        let author_chars = author.chars().count();
        if author_chars > MAX_AUTHOR_CHARS {
            return Err(PublisherError::validation(format!(
                "author is {} characters, limit is {}",
                author_chars, MAX_AUTHOR_CHARS
            )));
        }
    }

    if let Some(source_url) = non_blank(request.source_url.as_deref()) {
        Url::parse(source_url)
            .map_err(|e| PublisherError::validation(format!("invalid source url {}: {}", source_url, e)))?;
    }

    if request.preview_mode && non_blank(request.preview_recipient.as_deref()).is_none() {
        return Err(PublisherError::validation("preview mode requires a preview recipient"));
    }

    Ok(())
}
