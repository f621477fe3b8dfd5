pub mod types;
pub mod config;
pub mod traits;
pub mod client;
pub mod sandbox;
pub mod token;
pub mod media;
pub mod digest;
pub mod render;
pub mod status;
pub mod observer;
pub mod publisher;
pub mod report;

pub use types::*;
pub use config::PublisherConfig;
pub use traits::{ContentRenderer, PlatformApi, PublishEvent, PublishObserver};
pub use client::WeChatApi;
pub use sandbox::{SandboxFailure, SandboxPlatform};
pub use token::TokenCache;
pub use media::MediaUploader;
pub use digest::extract_digest;
pub use render::BasicMarkdownRenderer;
pub use status::StatusQuery;
pub use observer::TracingObserver;
pub use publisher::ArticlePublisher;
pub use report::{format_error, format_outcome, format_status, Response};
