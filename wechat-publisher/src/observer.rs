use crate::traits::{PublishEvent, PublishObserver};
use tracing::{debug, info, warn};

/// Default observer: every event becomes a `tracing` event.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl PublishObserver for TracingObserver {
    fn record(&self, event: &PublishEvent<'_>) {
        match event {
            PublishEvent::CoverUploaded { media_id } => debug!("Cover uploaded as {}", media_id),
            PublishEvent::CoverSkipped { path, error } => {
                warn!("Publishing without cover {}: {}", path.display(), error)
            }
            PublishEvent::DraftCreated { media_id } => info!("Draft created: {}", media_id),
            PublishEvent::Submitted { publish_id, msg_id } => {
                info!("Submitted for publication: {} (msg {:?})", publish_id, msg_id)
            }
            PublishEvent::ConfirmationFailed { attempt, error } => {
                warn!("Status check {} failed: {}", attempt, error)
            }
            PublishEvent::UrlResolved {
                publish_id,
                url,
                confirmed: true,
            } => info!("Article {} is live at {}", publish_id, url),
            PublishEvent::UrlResolved {
                publish_id,
                url,
                confirmed: false,
            } => warn!("Article URL for {} not confirmed, using {}", publish_id, url),
            PublishEvent::PreviewSent { recipient, msg_id } => {
                info!("Preview sent to {} (msg {:?})", recipient, msg_id)
            }
        }
    }
}
