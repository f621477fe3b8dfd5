use crate::token::TokenCache;
use crate::traits::PlatformApi;
use crate::types::{
    ArticleLink, Credentials, EngagementCounters, PublishState, PublishStatusPayload, PublisherError,
    Result, StatusSnapshot,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Fetches publish/audit status for a submitted article. Never cached.
pub struct StatusQuery {
    api: Arc<dyn PlatformApi>,
    tokens: Arc<TokenCache>,
}

impl StatusQuery {
    pub fn new(api: Arc<dyn PlatformApi>, tokens: Arc<TokenCache>) -> Self {
        Self { api, tokens }
    }

    pub async fn query_status(&self, credentials: &Credentials, publish_id: &str) -> Result<StatusSnapshot> {
        let publish_id = publish_id.trim();
        if publish_id.is_empty() {
            return Err(PublisherError::validation("publish id is required"));
        }

        let token = self.tokens.get_token(credentials).await?;
        let payload = match self.api.fetch_publish_status(&token.value, publish_id).await {
            Ok(payload) => payload,
            Err(e) => {
                if TokenCache::is_token_rejection(&e) {
                    self.tokens.invalidate(&credentials.app_id).await;
                }
                return Err(e);
            }
        };

        let snapshot = snapshot_from_payload(publish_id, payload);
        debug!(
            "Publish {} is {} ({} article(s))",
            snapshot.publish_id,
            snapshot.state,
            snapshot.articles.len()
        );
        Ok(snapshot)
    }
}

/// `freepublish/get` status codes.
pub fn map_publish_status(code: Option<i64>) -> PublishState {
    match code {
        Some(0) => PublishState::Published,
        Some(1) => PublishState::UnderReview,
        Some(2) | Some(3) => PublishState::Failed,
        Some(4) => PublishState::ReviewFailed,
        _ => PublishState::Unknown,
    }
}

pub fn snapshot_from_payload(publish_id: &str, payload: PublishStatusPayload) -> StatusSnapshot {
    let articles = payload
        .article_detail
        .map(|detail| {
            detail
                .item
                .into_iter()
                .map(|item| ArticleLink {
                    index: item.idx,
                    url: item.article_url,
                    deleted: item.is_deleted,
                })
                .collect()
        })
        .unwrap_or_default();

    let engagement = payload
        .stat
        .map(|stat| EngagementCounters {
            read_count: stat.read_num,
            like_count: stat.like_num,
            share_count: stat.share_num,
            comment_count: stat.comment_num,
            favorite_count: stat.collect_num,
        })
        .unwrap_or_default();

    StatusSnapshot {
        publish_id: payload.publish_id.unwrap_or_else(|| publish_id.to_string()),
        state: map_publish_status(payload.publish_status),
        raw_status: payload.publish_status,
        article_id: payload.article_id,
        articles,
        failed_indexes: payload.fail_idx,
        engagement,
        fetched_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SandboxFailure, SandboxPlatform};
    use crate::types::{ArticleDetail, ArticleItem, ArticleStat, PlatformOp};

    fn query(sandbox: &Arc<SandboxPlatform>) -> StatusQuery {
        StatusQuery::new(sandbox.clone(), Arc::new(TokenCache::new(sandbox.clone())))
    }

    #[test]
    fn maps_every_known_code() {
        assert_eq!(map_publish_status(Some(0)), PublishState::Published);
        assert_eq!(map_publish_status(Some(1)), PublishState::UnderReview);
        assert_eq!(map_publish_status(Some(2)), PublishState::Failed);
        assert_eq!(map_publish_status(Some(3)), PublishState::Failed);
        assert_eq!(map_publish_status(Some(4)), PublishState::ReviewFailed);
    }

    #[test]
    fn unrecognized_or_missing_code_is_unknown() {
        assert_eq!(map_publish_status(Some(99)), PublishState::Unknown);
        assert_eq!(map_publish_status(Some(-1)), PublishState::Unknown);
        assert_eq!(map_publish_status(None), PublishState::Unknown);
    }

    #[test]
    fn payload_without_detail_has_no_url() {
        let snapshot = snapshot_from_payload(
            "P1",
            PublishStatusPayload {
                publish_status: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(snapshot.publish_id, "P1");
        assert_eq!(snapshot.state, PublishState::UnderReview);
        assert!(snapshot.primary_url().is_none());
        assert_eq!(snapshot.engagement, EngagementCounters::default());
    }

    #[tokio::test]
    async fn published_item_carries_url_and_counters() {
        let payload = PublishStatusPayload {
            publish_id: Some("P1".to_string()),
            publish_status: Some(0),
            article_id: Some("A1".to_string()),
            article_detail: Some(ArticleDetail {
                item: vec![
                    ArticleItem {
                        idx: 1,
                        article_url: "https://mp.weixin.qq.com/s/old".to_string(),
                        is_deleted: true,
                    },
                    ArticleItem {
                        idx: 2,
                        article_url: "https://mp.weixin.qq.com/s/live".to_string(),
                        is_deleted: false,
                    },
                ],
            }),
            fail_idx: Vec::new(),
            stat: Some(ArticleStat {
                read_num: 120,
                like_num: 7,
                share_num: 3,
                comment_num: 2,
                collect_num: 1,
            }),
        };
        let sandbox = Arc::new(SandboxPlatform::new().with_status(payload));

        let snapshot = query(&sandbox)
            .query_status(&Credentials::new("wx1", "s"), "P1")
            .await
            .unwrap();

        assert_eq!(snapshot.state, PublishState::Published);
        assert_eq!(snapshot.article_id.as_deref(), Some("A1"));
        assert_eq!(snapshot.primary_url(), Some("https://mp.weixin.qq.com/s/live"));
        assert_eq!(snapshot.engagement.read_count, 120);
        assert_eq!(snapshot.engagement.favorite_count, 1);
    }

    #[tokio::test]
    async fn blank_id_fails_before_any_call() {
        let sandbox = Arc::new(SandboxPlatform::new());
        let result = query(&sandbox).query_status(&Credentials::new("wx1", "s"), "  ").await;
        assert!(matches!(result, Err(PublisherError::Validation(_))));
        assert!(sandbox.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_token_is_dropped_from_cache() {
        let sandbox = Arc::new(SandboxPlatform::new().failing(
            PlatformOp::FetchPublishStatus,
            SandboxFailure::Platform {
                code: 40001,
                message: "invalid credential".to_string(),
            },
        ));
        let status = query(&sandbox);
        let creds = Credentials::new("wx1", "s");

        assert!(status.query_status(&creds, "P1").await.is_err());
        assert!(status.query_status(&creds, "P1").await.is_err());
        assert_eq!(sandbox.call_count(PlatformOp::FetchToken), 2);
    }
}
