use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{Html, IntoResponse, Response};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{confine, resolve_under_root};
use crate::config::ServerConfig;
use crate::pages::Pages;
use crate::routing::{HttpHandler, RequestInfo, UpgradeError, WsHandler};
use crate::session::{Connection, EditChannel, Poller, Session};
use crate::snapshot::FileSource;

/// `GET <document>`: the document shell. The content itself arrives over
/// the page's WebSocket.
pub struct DocumentPage {
    pages: Arc<Pages>,
}

impl DocumentPage {
    pub fn new(pages: Arc<Pages>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl HttpHandler for DocumentPage {
    async fn handle(&self, request: Request) -> Response {
        let path = request.uri().path();
        let title = urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        Html(self.pages.document(&title)).into_response()
    }
}

/// Upgrade on a document path: streams the file text whenever it changes
/// and writes inbound payloads back to it.
pub struct DocumentSession {
    config: Arc<ServerConfig>,
}

impl DocumentSession {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// File a session on `request_path` observes and edits.
    pub fn target(&self, request_path: &str) -> Result<PathBuf, UpgradeError> {
        if request_path.is_empty() || request_path == "/" {
            return Err(UpgradeError::BadTarget(request_path.to_string()));
        }
        resolve_under_root(&self.config.root, request_path)
            .map_err(|e| UpgradeError::BadTarget(format!("{}: {}", request_path, e)))
    }

    /// [`Self::target`] with symlinks resolved. A link that leads out of the
    /// root is refused, since the session would read and write through it.
    pub async fn confined_target(&self, request_path: &str) -> Result<PathBuf, UpgradeError> {
        let path = self.target(request_path)?;
        confine(&self.config.root, &path)
            .await
            .map_err(|e| UpgradeError::BadTarget(format!("{}: {}", request_path, e)))
    }
}

#[async_trait]
impl WsHandler for DocumentSession {
    async fn open(
        &self,
        connection: Connection,
        request: &RequestInfo,
    ) -> Result<Session, UpgradeError> {
        let path = self.confined_target(&request.path).await.map_err(|e| {
            warn!(conn_id = %connection.id(), "Not opening document session: {}", e);
            e
        })?;
        info!(
            conn_id = %connection.id(),
            file = %path.display(),
            "Document session opened"
        );

        let poll = Poller::start(
            Arc::new(FileSource::new(path.clone())),
            connection,
            self.config.poll_interval(),
        );
        let edits = EditChannel::new(path, poll.baseline());
        Ok(Session::new(format!("document {}", request.path))
            .with_poller(poll)
            .with_inbound(edits))
    }
}
