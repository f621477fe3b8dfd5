use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use wechat_publisher::{
    format_error, format_outcome, format_status, ArticlePublisher, Credentials, PublishRequest, PublisherConfig,
    Response, StatusRequest,
};

#[derive(Parser)]
#[command(name = "wechat-publish", version, about = "Publish articles to a WeChat Official Account")]
struct Cli {
    /// Use the in-memory sandbox instead of the live API
    #[arg(long, global = true)]
    sandbox: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish an article, or preview it with --preview-to
    Publish {
        #[arg(long)]
        title: String,
        /// Markdown or HTML file with the article body
        #[arg(long)]
        content_file: PathBuf,
        #[arg(long)]
        author: Option<String>,
        /// Cover image (png, jpg, gif or webp, up to 1 MiB)
        #[arg(long)]
        cover: Option<String>,
        #[arg(long)]
        digest: Option<String>,
        #[arg(long)]
        source_url: Option<String>,
        /// Open comments on the article
        #[arg(long)]
        comments: bool,
        /// Only followers may comment
        #[arg(long)]
        fans_only: bool,
        /// Send a preview to this follower's openid instead of publishing
        #[arg(long, value_name = "OPENID")]
        preview_to: Option<String>,
    },
    /// Show publish status and engagement for a publish id
    Status { publish_id: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // stdout carries the JSON response
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let mut config = PublisherConfig::from_env().context("invalid WECHAT_* configuration")?;
    if cli.sandbox {
        config.sandbox = true;
    }
    let credentials = Credentials::new(
        env::var("WECHAT_APP_ID").unwrap_or_default(),
        env::var("WECHAT_APP_SECRET").unwrap_or_default(),
    );

    let publisher = ArticlePublisher::from_config(&config)?;
    info!("Using {}", publisher.platform_name());

    let response = match cli.command {
        Command::Publish {
            title,
            content_file,
            author,
            cover,
            digest,
            source_url,
            comments,
            fans_only,
            preview_to,
        } => {
            let content = tokio::fs::read_to_string(&content_file)
                .await
                .with_context(|| format!("failed to read {}", content_file.display()))?;

            let request = PublishRequest {
                author,
                cover_image_path: cover,
                digest,
                source_url,
                open_comment: comments,
                fans_only_comment: fans_only,
                preview_mode: preview_to.is_some(),
                preview_recipient: preview_to,
                ..PublishRequest::new(title, content, credentials)
            };

            match publisher.publish(&request).await {
                Ok(outcome) => format_outcome(&outcome),
                Err(e) => report_failure(&e),
            }
        }
        Command::Status { publish_id } => {
            let request = StatusRequest {
                id: publish_id,
                credentials,
            };
            match publisher.query_status(&request).await {
                Ok(snapshot) => format_status(&snapshot),
                Err(e) => report_failure(&e),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_failure(e: &wechat_publisher::PublisherError) -> Response {
    error!("{}", e);
    format_error(e)
}
