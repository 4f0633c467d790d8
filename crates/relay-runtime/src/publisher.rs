//! Delivery of composed messages to a channel.
//!
//! Platform failures are translated at this boundary into the small
//! [`PublishError`] set callers match on.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use relay_message::Message;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The channel does not exist.
    #[error("channel not found")]
    NotFound,

    /// The channel exists but may not be written to.
    #[error("not allowed to publish in channel")]
    Forbidden,

    /// A failure that may succeed when tried again later.
    #[error("temporary publish failure: {0}")]
    Transient(String),

    #[error("publish failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, channel_id: &str, message: &Message) -> Result<(), PublishError>;
}

// ── DirectoryPublisher ────────────────────────────────────────────────────────

/// Publishes into `<root>/<channel_id>/`: one JSON file per message plus its
/// attachments, sharing a common file stem.
pub struct DirectoryPublisher {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn next_stem(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:04}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), seq)
    }
}

#[async_trait]
impl ReportPublisher for DirectoryPublisher {
    async fn publish(&self, channel_id: &str, message: &Message) -> Result<(), PublishError> {
        if !is_valid_channel_id(channel_id) {
            warn!(channel_id, "refusing to publish to invalid channel id");
            return Err(PublishError::NotFound);
        }

        let channel_dir = self.root.join(channel_id);
        tokio::fs::create_dir_all(&channel_dir)
            .await
            .map_err(classify_io)?;

        let json = serde_json::to_string_pretty(message)
            .map_err(|e| PublishError::Other(e.to_string()))?;

        let stem = self.next_stem();
        let mut written = Vec::with_capacity(message.attachments.len());
        match write_message(&channel_dir, &stem, message, json, &mut written).await {
            Ok(path) => {
                debug!(path = %path.display(), attachments = written.len(), "message published");
                Ok(())
            }
            Err(e) => {
                // A failed publish leaves nothing behind.
                for path in &written {
                    if let Err(err) = tokio::fs::remove_file(path).await {
                        warn!(path = %path.display(), error = %err, "failed to remove partial attachment");
                    }
                }
                Err(e)
            }
        }
    }
}

/// Write the attachments, then the message JSON. Paths of attachments already
/// on disk are pushed to `written`.
async fn write_message(
    channel_dir: &Path,
    stem: &str,
    message: &Message,
    json: String,
    written: &mut Vec<PathBuf>,
) -> Result<PathBuf, PublishError> {
    for attachment in &message.attachments {
        let path = channel_dir.join(format!("{}-{}", stem, attachment.file_name));
        tokio::fs::write(&path, &attachment.data)
            .await
            .map_err(classify_io)?;
        written.push(path);
    }

    let path = channel_dir.join(format!("{}.json", stem));
    tokio::fs::write(&path, json).await.map_err(classify_io)?;
    Ok(path)
}

/// Channel ids become a single path segment.
fn is_valid_channel_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn classify_io(err: std::io::Error) -> PublishError {
    match err.kind() {
        ErrorKind::NotFound => PublishError::NotFound,
        ErrorKind::PermissionDenied => PublishError::Forbidden,
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            PublishError::Transient(err.to_string())
        }
        _ => PublishError::Other(err.to_string()),
    }
}
