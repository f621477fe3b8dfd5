use crate::traits::PlatformApi;
use crate::types::{Credentials, PublisherError, Result, Token};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Tokens are treated as expired this many seconds before the platform's TTL.
pub const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Platform codes meaning the bearer token itself was rejected.
const TOKEN_REJECTED_CODES: [i64; 3] = [40001, 40014, 42001];

struct CachedToken {
    app_id: String,
    token: Token,
}

/// Holds one access token and refreshes it on demand.
///
/// Readers share the slot; refreshes are serialized and re-check the slot
/// once they hold the refresh lock, so callers that queued behind a refresh
/// reuse its result.
pub struct TokenCache {
    api: Arc<dyn PlatformApi>,
    slot: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self {
            api,
            slot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub async fn get_token(&self, credentials: &Credentials) -> Result<Token> {
        self.get_token_at(credentials, Utc::now()).await
    }

    pub(crate) async fn get_token_at(&self, credentials: &Credentials, now: DateTime<Utc>) -> Result<Token> {
        if let Some(token) = self.cached(&credentials.app_id, now).await {
            return Ok(token);
        }

        let _refresh = self.refresh_lock.lock().await;

        if let Some(token) = self.cached(&credentials.app_id, now).await {
            debug!("Token for {} refreshed by a concurrent caller", credentials.app_id);
            return Ok(token);
        }

        let issued = self
            .api
            .fetch_token(&credentials.app_id, &credentials.app_secret)
            .await
            .map_err(into_auth_error)?;

        if issued.expires_in <= 0 {
            return Err(PublisherError::Auth {
                code: None,
                message: format!("token issued with non-positive lifetime {}s", issued.expires_in),
            });
        }

        // Short-lived grants keep at least half their lifetime.
        let margin = REFRESH_MARGIN_SECONDS.min(issued.expires_in / 2);
        let token = Token {
            value: issued.access_token,
            expires_at: now + Duration::seconds(issued.expires_in - margin),
        };
        info!(
            "Issued access token for {} (valid until {})",
            credentials.app_id, token.expires_at
        );

        self.store(&credentials.app_id, token.clone()).await;
        Ok(token)
    }

    /// Drop the cached token for `app_id` so the next call refreshes.
    pub async fn invalidate(&self, app_id: &str) {
        let mut slot = self.slot.write().await;
        if slot.as_ref().is_some_and(|cached| cached.app_id == app_id) {
            debug!("Invalidating access token for {}", app_id);
            *slot = None;
        }
    }

    /// Whether `error` says the token we sent was not accepted.
    pub fn is_token_rejection(error: &PublisherError) -> bool {
        matches!(error, PublisherError::Platform { code, .. } if TOKEN_REJECTED_CODES.contains(code))
    }

    async fn cached(&self, app_id: &str, now: DateTime<Utc>) -> Option<Token> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| cached.app_id == app_id && now < cached.token.expires_at)
            .map(|cached| cached.token.clone())
    }

    /// A token only replaces one for the same account if it expires later.
    async fn store(&self, app_id: &str, token: Token) {
        let mut slot = self.slot.write().await;
        let replace = match slot.as_ref() {
            Some(existing) if existing.app_id == app_id => token.expires_at > existing.token.expires_at,
            _ => true,
        };

        if replace {
            *slot = Some(CachedToken {
                app_id: app_id.to_string(),
                token,
            });
        } else {
            debug!("Keeping cached token for {} with the later expiry", app_id);
        }
    }
}

/// A response from the token endpoint that is not a grant is an auth failure;
/// no response at all stays a network failure.
fn into_auth_error(error: PublisherError) -> PublisherError {
    match error {
        PublisherError::Platform { code, message, .. } => PublisherError::Auth {
            code: Some(code),
            message,
        },
        PublisherError::UnexpectedResponse { message, .. } => PublisherError::Auth { code: None, message },
        other => other,
    }
}
