//! Local development server for nabladown documents.
//!
//! Serves a directory over HTTP and keeps every open page in sync with the
//! files on disk over WebSocket. Document pages can also write edits back.

pub mod cli;
pub mod config;
pub mod handlers;
pub mod pages;
pub mod routing;
pub mod server;
pub mod session;
pub mod snapshot;

use std::sync::Arc;

use config::{ConfigError, ServerConfig};
use handlers::{
    DocumentPage, DocumentSession, Health, ListingPage, ListingSession, StaticAssets,
};
use pages::Pages;
use routing::Matcher;

pub use server::{Server, ServerBuilder, ServeError};

/// Build the server with the standard routes.
///
/// | Route | One-shot | Upgrade |
/// |---|---|---|
/// | `/` | listing shell | tree stream |
/// | `*.nd` | document shell | text stream + edits |
/// | media, scripts, styles | raw bytes | - |
/// | `/health` | `OK` | - |
pub fn create_server(config: ServerConfig) -> Result<Server, ConfigError> {
    config.validate()?;
    let config = Arc::new(config);

    let pages = Arc::new(
        Pages::new(
            config.root.display().to_string(),
            config.document_suffix(),
        )
        .with_stylesheet(config.stylesheet.clone()),
    );
    let document = config.document_pattern();
    let assets = config.static_pattern();

    Ok(Server::builder()
        .root(config.root.clone())
        .http(Matcher::exact("/health"), Health)
        .http(Matcher::exact("/"), ListingPage::new(pages.clone()))
        .ws(Matcher::exact("/"), ListingSession::new(config.clone()))
        .http(Matcher::pattern(&document)?, DocumentPage::new(pages))
        .ws(Matcher::pattern(&document)?, DocumentSession::new(config.clone()))
        .http(Matcher::pattern(&assets)?, StaticAssets::new(config.root.clone()))
        .build())
}
