//! Browser-to-disk edits for document sessions.
//!
//! Inbound payloads overwrite the session's file verbatim. There is no
//! conflict detection against external edits made at the same time: the
//! last write wins, whichever side made it.

use super::poller::Baseline;
use super::InboundHandler;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct EditChannel {
    path: PathBuf,
    baseline: Baseline,
}

impl EditChannel {
    /// `baseline` is the poller baseline of the same session; a persisted
    /// edit is recorded there so the next tick does not echo it back.
    pub fn new(path: impl Into<PathBuf>, baseline: Baseline) -> Self {
        Self {
            path: path.into(),
            baseline,
        }
    }
}

#[async_trait]
impl InboundHandler for EditChannel {
    async fn on_payload(&self, payload: String) {
        let mut last = self.baseline.lock().await;
        match tokio::fs::write(&self.path, payload.as_bytes()).await {
            Ok(()) => {
                debug!(path = %self.path.display(), bytes = payload.len(), "Persisted edit");
                *last = Some(Snapshot::Text(payload));
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to persist edit: {}", e);
            }
        }
    }
}
