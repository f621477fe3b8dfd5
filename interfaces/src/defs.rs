use serde::{Deserialize, Serialize};
use std::fmt;

/// Official Account credential pair. Supplied per call, never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.app_id.trim().is_empty() || self.app_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"***")
            .finish()
    }
}

/// A request to publish (or preview) one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub title: String,
    /// Markdown or HTML body.
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    pub credentials: Credentials,
    #[serde(default)]
    pub cover_image_path: Option<String>,
    /// Explicit summary; derived from the body when absent.
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub open_comment: bool,
    #[serde(default)]
    pub fans_only_comment: bool,
    #[serde(default)]
    pub preview_mode: bool,
    #[serde(default)]
    pub preview_recipient: Option<String>,
}

impl PublishRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author: None,
            credentials,
            cover_image_path: None,
            digest: None,
            source_url: None,
            open_comment: false,
            fans_only_comment: false,
            preview_mode: false,
            preview_recipient: None,
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn cover_image(mut self, path: impl Into<String>) -> Self {
        self.cover_image_path = Some(path.into());
        self
    }

    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn comments(mut self, open: bool, fans_only: bool) -> Self {
        self.open_comment = open;
        self.fans_only_comment = fans_only;
        self
    }

    pub fn preview_to(mut self, recipient: impl Into<String>) -> Self {
        self.preview_mode = true;
        self.preview_recipient = Some(recipient.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub id: String,
    pub credentials: Credentials,
}

/// Publication state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Pending,
    Published,
    Failed,
    UnderReview,
    ReviewFailed,
    Unknown,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Pending => "pending",
            PublishState::Published => "published",
            PublishState::Failed => "failed",
            PublishState::UnderReview => "under_review",
            PublishState::ReviewFailed => "review_failed",
            PublishState::Unknown => "unknown",
        }
    }

    /// No further transition is expected from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublishState::Published | PublishState::Failed | PublishState::ReviewFailed
        )
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub read_count: u64,
    pub like_count: u64,
    pub share_count: u64,
    pub comment_count: u64,
    pub favorite_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLink {
    pub index: u32,
    pub url: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    pub publish_id: Option<String>,
    pub msg_id: Option<String>,
    pub article_url: Option<String>,
    /// `false` when `article_url` is the synthesized fallback.
    pub url_confirmed: bool,
    pub media_id: Option<String>,
    pub cover_media_id: Option<String>,
    pub preview_recipient: Option<String>,
    pub state: Option<PublishState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub publish_id: String,
    pub publish_state: PublishState,
    pub raw_status: Option<i64>,
    pub article_id: Option<String>,
    pub articles: Vec<ArticleLink>,
    pub failed_indexes: Vec<u32>,
    pub engagement: EngagementCounters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResult {
    pub success: bool,
    /// Stable taxonomy: validation, auth, network, platform, internal.
    pub category: String,
    pub operation: Option<String>,
    pub code: Option<i64>,
    pub message: String,
    /// Advisory only: authentication, network_whitelist, media, generic.
    pub hint_category: String,
    pub hints: Vec<String>,
}
