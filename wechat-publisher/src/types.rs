use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
// Boundary types live in the interfaces crate
pub use interfaces::defs::{ArticleLink, Credentials, EngagementCounters, PublishState};
pub use interfaces::defs::{ErrorResult, PublishRequest, PublishResult, StatusRequest, StatusResult};

/// Bearer credential with its effective expiry (already shortened by the
/// refresh margin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Raw token grant as returned by `cgi-bin/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// An image ready to be sent to the platform.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Permanent material reference returned by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub media_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Article payload for one publish or preview attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub author: Option<String>,
    pub body_html: String,
    pub digest: String,
    pub cover_media_id: Option<String>,
    pub content_source_url: Option<String>,
    pub open_comment: bool,
    pub fans_only_comment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitReceipt {
    #[serde(deserialize_with = "string_or_number")]
    pub publish_id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub msg_data_id: Option<String>,
}

/// Body of `freepublish/get`, minus the errcode envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishStatusPayload {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub publish_id: Option<String>,
    #[serde(default)]
    pub publish_status: Option<i64>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub article_id: Option<String>,
    #[serde(default)]
    pub article_detail: Option<ArticleDetail>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fail_idx: Vec<u32>,
    #[serde(default)]
    pub stat: Option<ArticleStat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub item: Vec<ArticleItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleItem {
    pub idx: u32,
    #[serde(default)]
    pub article_url: String,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleStat {
    #[serde(default)]
    pub read_num: u64,
    #[serde(default)]
    pub like_num: u64,
    #[serde(default)]
    pub share_num: u64,
    #[serde(default)]
    pub comment_num: u64,
    #[serde(default)]
    pub collect_num: u64,
}

/// Normalized, never-cached view of a published item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub publish_id: String,
    pub state: PublishState,
    pub raw_status: Option<i64>,
    pub article_id: Option<String>,
    pub articles: Vec<ArticleLink>,
    pub failed_indexes: Vec<u32>,
    pub engagement: EngagementCounters,
    pub fetched_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// First non-deleted article URL, if the platform returned one.
    pub fn primary_url(&self) -> Option<&str> {
        self.articles
            .iter()
            .find(|a| !a.deleted && !a.url.is_empty())
            .map(|a| a.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRecord {
    pub media_id: String,
    pub publish_id: String,
    pub msg_id: Option<String>,
    pub article_url: String,
    pub url_confirmed: bool,
    pub state: PublishState,
    pub cover_media_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewReceipt {
    pub recipient: String,
    pub media_id: String,
    pub msg_id: Option<String>,
    pub cover_media_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Published(PublishRecord),
    Previewed(PreviewReceipt),
}

/// The remote procedures this crate consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformOp {
    FetchToken,
    UploadMedia,
    CreateDraft,
    SubmitPublish,
    CreatePreviewMedia,
    SendPreview,
    FetchPublishStatus,
}

impl PlatformOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformOp::FetchToken => "fetch_token",
            PlatformOp::UploadMedia => "upload_media",
            PlatformOp::CreateDraft => "create_draft",
            PlatformOp::SubmitPublish => "submit_publish",
            PlatformOp::CreatePreviewMedia => "create_preview_media",
            PlatformOp::SendPreview => "send_preview",
            PlatformOp::FetchPublishStatus => "fetch_publish_status",
        }
    }
}

impl fmt::Display for PlatformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Integration with the interfaces crate
impl From<&PublishRecord> for PublishResult {
    fn from(record: &PublishRecord) -> Self {
        Self {
            success: true,
            publish_id: Some(record.publish_id.clone()),
            msg_id: record.msg_id.clone(),
            article_url: Some(record.article_url.clone()),
            url_confirmed: record.url_confirmed,
            media_id: Some(record.media_id.clone()),
            cover_media_id: record.cover_media_id.clone(),
            preview_recipient: None,
            state: Some(record.state),
        }
    }
}

impl From<&PreviewReceipt> for PublishResult {
    fn from(receipt: &PreviewReceipt) -> Self {
        Self {
            success: true,
            msg_id: receipt.msg_id.clone(),
            media_id: Some(receipt.media_id.clone()),
            cover_media_id: receipt.cover_media_id.clone(),
            preview_recipient: Some(receipt.recipient.clone()),
            ..Default::default()
        }
    }
}

impl From<&PublishOutcome> for PublishResult {
    fn from(outcome: &PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::Published(record) => record.into(),
            PublishOutcome::Previewed(receipt) => receipt.into(),
        }
    }
}

impl From<&StatusSnapshot> for StatusResult {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            publish_id: snapshot.publish_id.clone(),
            publish_state: snapshot.state,
            raw_status: snapshot.raw_status,
            article_id: snapshot.article_id.clone(),
            articles: snapshot.articles.clone(),
            failed_indexes: snapshot.failed_indexes.clone(),
            engagement: snapshot.engagement.clone(),
        }
    }
}

/// Stable error category handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Auth,
    Network,
    Platform,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Network => "network",
            ErrorCategory::Platform => "platform",
            ErrorCategory::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Access token request rejected: {message}")]
    Auth { code: Option<i64>, message: String },

    #[error("Network error during {operation}: {message}")]
    Network { operation: PlatformOp, message: String },

    #[error("Platform rejected {operation} (errcode {code}): {message}")]
    Platform {
        operation: PlatformOp,
        code: i64,
        message: String,
    },

    #[error("Unexpected response from {operation}: {message}")]
    UnexpectedResponse { operation: PlatformOp, message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublisherError {
    pub fn validation(message: impl Into<String>) -> Self {
        PublisherError::Validation(message.into())
    }

    pub fn platform(operation: PlatformOp, code: i64, message: impl Into<String>) -> Self {
        PublisherError::Platform {
            operation,
            code,
            message: message.into(),
        }
    }

    pub fn network(operation: PlatformOp, message: impl Into<String>) -> Self {
        PublisherError::Network {
            operation,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PublisherError::Validation(_) => ErrorCategory::Validation,
            PublisherError::Auth { .. } => ErrorCategory::Auth,
            PublisherError::Network { .. } => ErrorCategory::Network,
            PublisherError::Platform { .. } => ErrorCategory::Platform,
            PublisherError::UnexpectedResponse { .. }
            | PublisherError::Http(_)
            | PublisherError::InvalidUrl(_)
            | PublisherError::Io(_) => ErrorCategory::Internal,
        }
    }

    pub fn operation(&self) -> Option<PlatformOp> {
        match self {
            PublisherError::Auth { .. } => Some(PlatformOp::FetchToken),
            PublisherError::Network { operation, .. }
            | PublisherError::Platform { operation, .. }
            | PublisherError::UnexpectedResponse { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Platform application code, when one was received.
    pub fn code(&self) -> Option<i64> {
        match self {
            PublisherError::Auth { code, .. } => *code,
            PublisherError::Platform { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The message as received, without the category prefix.
    pub fn message(&self) -> String {
        match self {
            PublisherError::Validation(message)
            | PublisherError::Auth { message, .. }
            | PublisherError::Network { message, .. }
            | PublisherError::Platform { message, .. }
            | PublisherError::UnexpectedResponse { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// The platform returns some identifiers as JSON numbers and others as strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// The platform sends `null` for some empty lists.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub type Result<T> = std::result::Result<T, PublisherError>;
