use crate::config::PublisherConfig;
use crate::traits::PlatformApi;
use crate::types::{
    opt_string_or_number, ArticleDraft, IssuedToken, MediaRef, MediaUpload, PlatformOp,
    PublishStatusPayload, PublisherError, Result, SubmitReceipt,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TOKEN_PATH: &str = "/cgi-bin/token";
const UPLOAD_MATERIAL_PATH: &str = "/cgi-bin/material/add_material";
const DRAFT_ADD_PATH: &str = "/cgi-bin/draft/add";
const PUBLISH_SUBMIT_PATH: &str = "/cgi-bin/freepublish/submit";
const PUBLISH_GET_PATH: &str = "/cgi-bin/freepublish/get";
const UPLOAD_NEWS_PATH: &str = "/cgi-bin/media/uploadnews";
const MASS_PREVIEW_PATH: &str = "/cgi-bin/message/mass/preview";

/// reqwest-backed client for the Official Account HTTP API.
pub struct WeChatApi {
    client: Client,
    config: PublisherConfig,
    base_url: String,
}

impl WeChatApi {
    pub fn new(config: PublisherConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.token_timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: PlatformOp,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T> {
        let start_time = Instant::now();

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(operation, e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublisherError::network(
                operation,
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(operation, e, timeout))?;

        debug!(
            "{} answered in {}ms ({} bytes)",
            operation,
            start_time.elapsed().as_millis(),
            body.len()
        );

        decode_envelope(operation, &body)
    }
}

#[async_trait]
impl PlatformApi for WeChatApi {
    fn platform_name(&self) -> String {
        format!("WeChat Official Account API ({})", self.base_url)
    }

    async fn fetch_token(&self, app_id: &str, app_secret: &str) -> Result<IssuedToken> {
        debug!("Requesting access token for {}", app_id);

        let request = self.client.get(self.endpoint(TOKEN_PATH)).query(&[
            ("grant_type", "client_credential"),
            ("appid", app_id),
            ("secret", app_secret),
        ]);

        self.send(PlatformOp::FetchToken, request, self.config.token_timeout())
            .await
    }

    async fn upload_media(&self, access_token: &str, upload: MediaUpload) -> Result<MediaRef> {
        debug!(
            "Uploading {} ({} bytes, {})",
            upload.file_name,
            upload.bytes.len(),
            upload.content_type
        );

        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| PublisherError::validation(format!("invalid content type: {}", e)))?;
        let form = Form::new().part("media", part);

        let request = self
            .client
            .post(self.endpoint(UPLOAD_MATERIAL_PATH))
            .query(&[("access_token", access_token), ("type", "image")])
            .multipart(form);

        self.send(PlatformOp::UploadMedia, request, self.config.upload_timeout())
            .await
    }

    async fn create_draft(&self, access_token: &str, article: &ArticleDraft) -> Result<String> {
        let body = ArticlesBody {
            articles: vec![WireArticle::for_draft(article)],
        };

        let request = self
            .client
            .post(self.endpoint(DRAFT_ADD_PATH))
            .query(&[("access_token", access_token)])
            .json(&body);

        let created: MediaIdResponse = self
            .send(PlatformOp::CreateDraft, request, self.config.api_timeout())
            .await?;
        Ok(created.media_id)
    }

    async fn submit_publish(&self, access_token: &str, media_id: &str) -> Result<SubmitReceipt> {
        let request = self
            .client
            .post(self.endpoint(PUBLISH_SUBMIT_PATH))
            .query(&[("access_token", access_token)])
            .json(&json!({ "media_id": media_id }));

        self.send(PlatformOp::SubmitPublish, request, self.config.api_timeout())
            .await
    }

    async fn create_preview_media(&self, access_token: &str, article: &ArticleDraft) -> Result<String> {
        let body = ArticlesBody {
            articles: vec![WireArticle::for_preview(article)],
        };

        let request = self
            .client
            .post(self.endpoint(UPLOAD_NEWS_PATH))
            .query(&[("access_token", access_token)])
            .json(&body);

        let created: MediaIdResponse = self
            .send(PlatformOp::CreatePreviewMedia, request, self.config.api_timeout())
            .await?;
        Ok(created.media_id)
    }

    async fn send_preview(&self, access_token: &str, recipient: &str, media_id: &str) -> Result<Option<String>> {
        let request = self
            .client
            .post(self.endpoint(MASS_PREVIEW_PATH))
            .query(&[("access_token", access_token)])
            .json(&json!({
                "touser": recipient,
                "mpnews": { "media_id": media_id },
                "msgtype": "mpnews",
            }));

        let sent: PreviewResponse = self
            .send(PlatformOp::SendPreview, request, self.config.api_timeout())
            .await?;
        Ok(sent.msg_id)
    }

    async fn fetch_publish_status(&self, access_token: &str, publish_id: &str) -> Result<PublishStatusPayload> {
        let request = self
            .client
            .post(self.endpoint(PUBLISH_GET_PATH))
            .query(&[("access_token", access_token)])
            .json(&json!({ "publish_id": publish_id }));

        self.send(PlatformOp::FetchPublishStatus, request, self.config.api_timeout())
            .await
    }
}

/// Check the embedded `errcode` before decoding the payload; a transport
/// success can still carry an application failure.
pub(crate) fn decode_envelope<T: DeserializeOwned>(operation: PlatformOp, body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body).map_err(|e| PublisherError::UnexpectedResponse {
        operation,
        message: format!("invalid JSON: {}", e),
    })?;

    let code = value.get("errcode").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = value
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        warn!("{} failed with errcode {}: {}", operation, code, message);
        return Err(PublisherError::platform(operation, code, message));
    }

    serde_json::from_value(value).map_err(|e| PublisherError::UnexpectedResponse {
        operation,
        message: e.to_string(),
    })
}

fn transport_error(operation: PlatformOp, error: reqwest::Error, timeout: Duration) -> PublisherError {
    let message = if error.is_timeout() {
        format!("timed out after {}s", timeout.as_secs())
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };
    PublisherError::network(operation, message)
}

#[derive(Serialize)]
struct ArticlesBody<'a> {
    articles: Vec<WireArticle<'a>>,
}

#[derive(Serialize)]
struct WireArticle<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a str>,
    digest: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_source_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb_media_id: Option<&'a str>,
    need_open_comment: u8,
    only_fans_can_comment: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    show_cover_pic: Option<u8>,
}

impl<'a> WireArticle<'a> {
    fn for_draft(article: &'a ArticleDraft) -> Self {
        Self {
            title: &article.title,
            author: article.author.as_deref(),
            digest: &article.digest,
            content: &article.body_html,
            content_source_url: article.content_source_url.as_deref(),
            thumb_media_id: article.cover_media_id.as_deref(),
            need_open_comment: article.open_comment as u8,
            only_fans_can_comment: article.fans_only_comment as u8,
            show_cover_pic: None,
        }
    }

    fn for_preview(article: &'a ArticleDraft) -> Self {
        Self {
            show_cover_pic: Some(article.cover_media_id.is_some() as u8),
            ..Self::for_draft(article)
        }
    }
}

#[derive(Deserialize)]
struct MediaIdResponse {
    media_id: String,
}

#[derive(Deserialize)]
struct PreviewResponse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    msg_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> ArticleDraft {
        ArticleDraft {
            title: "Hello".to_string(),
            author: None,
            body_html: "<h1>Hi</h1>".to_string(),
            digest: "Hi".to_string(),
            cover_media_id: Some("thumb-1".to_string()),
            content_source_url: None,
            open_comment: true,
            fans_only_comment: false,
        }
    }

    #[test]
    fn embedded_error_code_is_a_failure() {
        let body = r#"{"errcode":40001,"errmsg":"invalid credential, access_token is invalid"}"#;
        let result: Result<MediaIdResponse> = decode_envelope(PlatformOp::CreateDraft, body);
        match result {
            Err(PublisherError::Platform { operation, code, message }) => {
                assert_eq!(operation, PlatformOp::CreateDraft);
                assert_eq!(code, 40001);
                assert!(message.contains("invalid credential"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("errcode 40001 must not decode as success"),
        }
    }

    #[test]
    fn zero_error_code_decodes_payload() {
        let body = r#"{"errcode":0,"errmsg":"ok","publish_id":"P1","msg_data_id":2247483}"#;
        let receipt: SubmitReceipt = decode_envelope(PlatformOp::SubmitPublish, body).unwrap();
        assert_eq!(receipt.publish_id, "P1");
        assert_eq!(receipt.msg_data_id.as_deref(), Some("2247483"));
    }

    #[test]
    fn null_lists_in_status_decode_as_empty() {
        let body = r#"{"publish_id":"P1","publish_status":1,"article_detail":{"count":0,"item":null},"fail_idx":null}"#;
        let status: PublishStatusPayload = decode_envelope(PlatformOp::FetchPublishStatus, body).unwrap();
        assert_eq!(status.publish_status, Some(1));
        assert!(status.fail_idx.is_empty());
        assert!(status.article_detail.unwrap().item.is_empty());
    }

    #[test]
    fn garbage_body_is_unexpected_response() {
        let result: Result<MediaIdResponse> = decode_envelope(PlatformOp::CreateDraft, "<html>");
        assert!(matches!(result, Err(PublisherError::UnexpectedResponse { .. })));

        let result: Result<MediaIdResponse> = decode_envelope(PlatformOp::CreateDraft, "{}");
        assert!(matches!(result, Err(PublisherError::UnexpectedResponse { .. })));
    }

    #[test]
    fn wire_article_maps_flags_and_cover() {
        let article = sample_article();
        let draft = serde_json::to_value(WireArticle::for_draft(&article)).unwrap();
        assert_eq!(draft["thumb_media_id"], "thumb-1");
        assert_eq!(draft["need_open_comment"], 1);
        assert_eq!(draft["only_fans_can_comment"], 0);
        assert!(draft.get("author").is_none());
        assert!(draft.get("show_cover_pic").is_none());

        let preview = serde_json::to_value(WireArticle::for_preview(&article)).unwrap();
        assert_eq!(preview["show_cover_pic"], 1);
    }
}
