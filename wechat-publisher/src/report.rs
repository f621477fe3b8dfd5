use crate::types::{ErrorResult, PublishOutcome, PublishResult, PublisherError, StatusResult, StatusSnapshot};
use serde::Serialize;
use serde_json::Value;

/// What a caller gets back: a readable summary plus structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub success: bool,
    pub text: String,
    pub data: Value,
}

/// Advisory grouping used only to choose remediation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintCategory {
    Authentication,
    NetworkWhitelist,
    Media,
    Generic,
}

impl HintCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HintCategory::Authentication => "authentication",
            HintCategory::NetworkWhitelist => "network_whitelist",
            HintCategory::Media => "media",
            HintCategory::Generic => "generic",
        }
    }
}

const WHITELIST_CODES: [i64; 2] = [40164, 61004];
const AUTH_CODES: [i64; 9] = [40001, 40002, 40013, 40014, 40125, 41001, 41002, 41004, 42001];
const MEDIA_CODES: [i64; 6] = [40004, 40005, 40006, 40007, 40009, 45001];

pub fn classify(message: &str, code: Option<i64>) -> HintCategory {
    let lower = message.to_lowercase();

    if code.is_some_and(|c| WHITELIST_CODES.contains(&c)) || lower.contains("whitelist") {
        return HintCategory::NetworkWhitelist;
    }
    if code.is_some_and(|c| AUTH_CODES.contains(&c))
        || ["appsecret", "appid", "access_token", "credential"]
            .iter()
            .any(|needle| lower.contains(needle))
    {
        return HintCategory::Authentication;
    }
    if code.is_some_and(|c| MEDIA_CODES.contains(&c))
        || ["media", "image", "file"].iter().any(|needle| lower.contains(needle))
    {
        return HintCategory::Media;
    }
    HintCategory::Generic
}

pub fn remediation_hints(category: HintCategory) -> Vec<String> {
    let hints: &[&str] = match category {
        HintCategory::Authentication => &[
            "Check WECHAT_APP_ID and WECHAT_APP_SECRET against the Official Account console",
            "Make sure the AppSecret has not been reset since it was configured",
        ],
        HintCategory::NetworkWhitelist => &[
            "Add this machine's public IP to the API IP whitelist in the Official Account console",
        ],
        HintCategory::Media => &[
            "Use a png, jpg, gif or webp cover no larger than 1 MiB",
            "Check that the media id belongs to this account",
        ],
        HintCategory::Generic => &["Retry later; if it keeps failing, check the platform error code reference"],
    };
    hints.iter().map(|h| h.to_string()).collect()
}

pub fn format_outcome(outcome: &PublishOutcome) -> Response {
    let text = match outcome {
        PublishOutcome::Published(record) if record.url_confirmed => format!(
            "Article published (publish_id {}): {}",
            record.publish_id, record.article_url
        ),
        PublishOutcome::Published(record) => format!(
            "Article submitted (publish_id {}, state {}). URL not confirmed yet, expected at {}",
            record.publish_id, record.state, record.article_url
        ),
        PublishOutcome::Previewed(receipt) => format!("Preview sent to {}", receipt.recipient),
    };

    Response {
        success: true,
        text,
        data: to_data(&PublishResult::from(outcome)),
    }
}

pub fn format_status(snapshot: &StatusSnapshot) -> Response {
    let counters = &snapshot.engagement;
    let mut text = format!(
        "Publish {} is {}: {} reads, {} likes, {} shares, {} comments, {} favorites",
        snapshot.publish_id,
        snapshot.state,
        counters.read_count,
        counters.like_count,
        counters.share_count,
        counters.comment_count,
        counters.favorite_count
    );
    if let Some(url) = snapshot.primary_url() {
        text.push_str(&format!("\n{}", url));
    }

    Response {
        success: true,
        text,
        data: to_data(&StatusResult::from(snapshot)),
    }
}

pub fn format_error(error: &PublisherError) -> Response {
    let message = error.message();
    let hint_category = classify(&message, error.code());
    let hints = remediation_hints(hint_category);

    let text = match error.operation() {
        Some(operation) => format!("{} failed ({}): {}", operation, error.category().as_str(), message),
        None => format!("{} error: {}", error.category().as_str(), message),
    };

    let result = ErrorResult {
        success: false,
        category: error.category().as_str().to_string(),
        operation: error.operation().map(|op| op.as_str().to_string()),
        code: error.code(),
        message,
        hint_category: hint_category.as_str().to_string(),
        hints,
    };

    Response {
        success: false,
        text,
        data: to_data(&result),
    }
}

fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ArticleLink, EngagementCounters, PlatformOp, PreviewReceipt, PublishRecord, PublishState,
    };
    use chrono::Utc;

    fn record(confirmed: bool) -> PublishRecord {
        PublishRecord {
            media_id: "M1".to_string(),
            publish_id: "P1".to_string(),
            msg_id: Some("S1".to_string()),
            article_url: "https://mp.weixin.qq.com/s/P1".to_string(),
            url_confirmed: confirmed,
            state: if confirmed { PublishState::Published } else { PublishState::Pending },
            cover_media_id: None,
            created_at: Utc::now(),
            submitted_at: Utc::now(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn classifies_by_code_then_message() {
        assert_eq!(classify("whatever", Some(40164)), HintCategory::NetworkWhitelist);
        assert_eq!(classify("invalid ip 1.2.3.4, not in whitelist", None), HintCategory::NetworkWhitelist);
        assert_eq!(classify("invalid appsecret", Some(40125)), HintCategory::Authentication);
        assert_eq!(classify("access_token expired", None), HintCategory::Authentication);
        assert_eq!(classify("invalid media type", Some(40004)), HintCategory::Media);
        assert_eq!(classify("cover image not found: a.png", None), HintCategory::Media);
        assert_eq!(classify("system busy", Some(-1)), HintCategory::Generic);
    }

    #[test]
    fn published_outcome_carries_ids() {
        let response = format_outcome(&PublishOutcome::Published(record(true)));
        assert!(response.success);
        assert!(response.text.contains("https://mp.weixin.qq.com/s/P1"));
        assert_eq!(response.data["media_id"], "M1");
        assert_eq!(response.data["publish_id"], "P1");
        assert_eq!(response.data["msg_id"], "S1");
        assert_eq!(response.data["url_confirmed"], true);
        assert_eq!(response.data["state"], "published");
    }

    #[test]
    fn unconfirmed_url_is_called_out() {
        let response = format_outcome(&PublishOutcome::Published(record(false)));
        assert!(response.text.contains("not confirmed"));
        assert_eq!(response.data["url_confirmed"], false);
    }

    #[test]
    fn preview_has_no_publish_ids() {
        let response = format_outcome(&PublishOutcome::Previewed(PreviewReceipt {
            recipient: "oUser".to_string(),
            media_id: "N1".to_string(),
            msg_id: Some("S9".to_string()),
            cover_media_id: None,
            sent_at: Utc::now(),
        }));
        assert_eq!(response.data["preview_recipient"], "oUser");
        assert!(response.data["publish_id"].is_null());
        assert!(response.data["article_url"].is_null());
    }

    #[test]
    fn status_lists_counters() {
        let snapshot = StatusSnapshot {
            publish_id: "P1".to_string(),
            state: PublishState::Published,
            raw_status: Some(0),
            article_id: Some("A1".to_string()),
            articles: vec![ArticleLink {
                index: 1,
                url: "https://mp.weixin.qq.com/s/live".to_string(),
                deleted: false,
            }],
            failed_indexes: Vec::new(),
            engagement: EngagementCounters {
                read_count: 10,
                like_count: 2,
                ..Default::default()
            },
            fetched_at: Utc::now(),
        };

        let response = format_status(&snapshot);
        assert!(response.text.contains("10 reads"));
        assert!(response.text.contains("https://mp.weixin.qq.com/s/live"));
        assert_eq!(response.data["publish_state"], "published");
        assert_eq!(response.data["engagement"]["like_count"], 2);
    }

    #[test]
    fn error_keeps_platform_message_verbatim() {
        let error = PublisherError::platform(PlatformOp::CreateDraft, 40001, "invalid credential, access_token is invalid");
        let response = format_error(&error);

        assert!(!response.success);
        assert_eq!(response.data["category"], "platform");
        assert_eq!(response.data["operation"], "create_draft");
        assert_eq!(response.data["code"], 40001);
        assert_eq!(response.data["message"], "invalid credential, access_token is invalid");
        assert_eq!(response.data["hint_category"], "authentication");
        assert!(!response.data["hints"].as_array().unwrap().is_empty());
    }

    #[test]
    fn validation_error_has_no_operation() {
        let response = format_error(&PublisherError::validation("title is required"));
        assert_eq!(response.data["category"], "validation");
        assert!(response.data["operation"].is_null());
        assert_eq!(response.text, "validation error: title is required");
    }
}
