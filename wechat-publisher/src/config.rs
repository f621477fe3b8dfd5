use crate::types::{PublisherError, Result};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.weixin.qq.com";

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub api_base_url: String,
    pub user_agent: String,
    pub token_timeout_seconds: u64,
    pub api_timeout_seconds: u64,
    pub upload_timeout_seconds: u64,
    /// Route every platform call to the in-memory sandbox.
    pub sandbox: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: "WeChat-Publisher/0.1".to_string(),
            token_timeout_seconds: 10,
            api_timeout_seconds: 30,
            upload_timeout_seconds: 60,
            sandbox: false,
        }
    }
}

impl PublisherConfig {
    /// Defaults overridden by `WECHAT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = env::var("WECHAT_API_BASE_URL") {
            config.api_base_url = base_url;
        }
        if let Ok(value) = env::var("WECHAT_SANDBOX") {
            config.sandbox = parse_flag(&value);
        }
        if let Ok(value) = env::var("WECHAT_TIMEOUT_SECONDS") {
            config.api_timeout_seconds = parse_seconds("WECHAT_TIMEOUT_SECONDS", &value)?;
        }
        if let Ok(value) = env::var("WECHAT_UPLOAD_TIMEOUT_SECONDS") {
            config.upload_timeout_seconds = parse_seconds("WECHAT_UPLOAD_TIMEOUT_SECONDS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn sandboxed() -> Self {
        Self {
            sandbox: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PublisherError::validation(format!(
                "api_base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.token_timeout_seconds == 0 || self.api_timeout_seconds == 0 || self.upload_timeout_seconds == 0 {
            return Err(PublisherError::validation("timeouts must be greater than zero"));
        }
        Ok(())
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_seconds)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_seconds)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_seconds(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| PublisherError::validation(format!("{} must be a number of seconds, got {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PublisherConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.sandbox);
        assert!(config.token_timeout() < config.api_timeout());
        assert!(config.api_timeout() < config.upload_timeout());
    }

    #[test]
    fn rejects_bad_base_url_and_zero_timeout() {
        let config = PublisherConfig {
            api_base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PublisherError::InvalidUrl(_))));

        let config = PublisherConfig {
            api_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PublisherError::Validation(_))));
    }

    #[test]
    fn parses_flags() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
        assert_eq!(parse_seconds("X", " 15 ").unwrap(), 15);
        assert!(parse_seconds("X", "soon").is_err());
    }
}
