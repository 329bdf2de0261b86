//! Static asset serving.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{confine, resolve_under_root};
use crate::routing::HttpHandler;

/// Errors serving a file from the root.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("file not found")]
    NotFound,
    #[error("path escapes the server root")]
    Forbidden,
    #[error("invalid path: {0}")]
    BadPath(String),
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssetError::NotFound => StatusCode::NOT_FOUND,
            AssetError::Forbidden => StatusCode::FORBIDDEN,
            AssetError::BadPath(_) => StatusCode::BAD_REQUEST,
            AssetError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Serves raw file bytes from the server root.
pub struct StaticAssets {
    root: PathBuf,
}

impl StaticAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read the file a request path refers to, refusing anything that
    /// resolves outside the root, either lexically or through a symlink.
    pub async fn read(&self, request_path: &str) -> Result<(PathBuf, Vec<u8>), AssetError> {
        let path = resolve_under_root(&self.root, request_path)?;
        let canonical = confine(&self.root, &path).await?;

        match fs::read(&canonical).await {
            Ok(bytes) => Ok((canonical, bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(AssetError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HttpHandler for StaticAssets {
    async fn handle(&self, request: Request) -> Response {
        let request_path = request.uri().path();
        match self.read(request_path).await {
            Ok((path, bytes)) => (
                [(header::CONTENT_TYPE, guess_content_type(&path))],
                Body::from(bytes),
            )
                .into_response(),
            Err(e) => {
                match &e {
                    AssetError::Forbidden => warn!(path = %request_path, "Refused path outside root"),
                    _ => debug!(path = %request_path, "Static asset failed: {}", e),
                }
                e.into_response()
            }
        }
    }
}

/// Guess content type from file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogv") => "video/ogg",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}
