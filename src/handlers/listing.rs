use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::pages::Pages;
use crate::routing::{HttpHandler, RequestInfo, UpgradeError, WsHandler};
use crate::session::{Connection, Poller, Session};
use crate::snapshot::TreeSource;

/// `GET /`: the listing shell.
pub struct ListingPage {
    pages: Arc<Pages>,
}

impl ListingPage {
    pub fn new(pages: Arc<Pages>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl HttpHandler for ListingPage {
    async fn handle(&self, _request: Request) -> Response {
        Html(self.pages.listing()).into_response()
    }
}

/// Upgrade at `/`: streams the pruned directory tree whenever it changes.
pub struct ListingSession {
    config: Arc<ServerConfig>,
}

impl ListingSession {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl WsHandler for ListingSession {
    async fn open(
        &self,
        connection: Connection,
        request: &RequestInfo,
    ) -> Result<Session, UpgradeError> {
        let source = TreeSource::new(
            self.config.root.clone(),
            self.config.depth,
            self.config.document_suffix(),
        );
        info!(
            conn_id = %connection.id(),
            path = %request.path,
            depth = self.config.depth,
            "Listing session opened"
        );

        let poll = Poller::start(Arc::new(source), connection, self.config.poll_interval());
        Ok(Session::new(format!("listing {}", request.path)).with_poller(poll))
    }
}
