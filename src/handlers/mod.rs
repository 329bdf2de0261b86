//! Route handlers wired by [`crate::create_server`].
//!
//! - `GET /` and upgrade `/` - directory listing
//! - `GET` and upgrade on document paths - single document, editable
//! - `GET` on static asset paths - raw file bytes
//! - `GET /health` - liveness

pub mod assets;
pub mod document;
pub mod listing;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::routing::HttpHandler;

pub use assets::{AssetError, StaticAssets};
pub use document::{DocumentPage, DocumentSession};
pub use listing::{ListingPage, ListingSession};

/// Map a raw request path to a filesystem path under `root`.
///
/// The path is percent-decoded and normalized lexically; any `..` that
/// would climb above the root is refused.
pub fn resolve_under_root(root: &Path, request_path: &str) -> Result<PathBuf, AssetError> {
    let decoded = urlencoding::decode(request_path)
        .map_err(|_| AssetError::BadPath(request_path.to_string()))?;
    if decoded.is_empty() || decoded.contains('\0') {
        return Err(AssetError::BadPath(request_path.to_string()));
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(AssetError::Forbidden);
                }
            }
            Component::Prefix(_) => return Err(AssetError::Forbidden),
        }
    }

    let mut path = root.to_path_buf();
    path.extend(parts);
    Ok(path)
}

/// Resolve symlinks in `path` and refuse it if the result leaves `root`.
///
/// `path` must already be lexically under `root` (see
/// [`resolve_under_root`]). It does not have to exist: the deepest existing
/// ancestor is resolved and the rest appended, so a document that is
/// created later stays addressable.
pub async fn confine(root: &Path, path: &Path) -> Result<PathBuf, AssetError> {
    let root = fs::canonicalize(root).await?;

    let mut missing = Vec::new();
    let mut existing = path;
    let resolved = loop {
        match fs::canonicalize(existing).await {
            Ok(resolved) => break resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
                    return Err(e.into());
                };
                missing.push(name);
                existing = parent;
            }
            Err(e) => return Err(e.into()),
        }
    };

    if !resolved.starts_with(&root) {
        return Err(AssetError::Forbidden);
    }
    let mut confined = resolved;
    confined.extend(missing.into_iter().rev());
    Ok(confined)
}

pub struct Health;

#[async_trait]
impl HttpHandler for Health {
    async fn handle(&self, _request: Request) -> Response {
        "OK".into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_under_root() {
        let root = Path::new("/srv/notes");
        assert_eq!(
            resolve_under_root(root, "/sub/b.nd").unwrap(),
            PathBuf::from("/srv/notes/sub/b.nd")
        );
        assert_eq!(
            resolve_under_root(root, "/sub/../a%20b.nd").unwrap(),
            PathBuf::from("/srv/notes/a b.nd")
        );
        assert_eq!(
            resolve_under_root(root, "/./x.png").unwrap(),
            PathBuf::from("/srv/notes/x.png")
        );
    }

    #[test]
    fn test_resolve_refuses_escape() {
        let root = Path::new("/srv/notes");
        assert!(matches!(
            resolve_under_root(root, "/../../etc/passwd"),
            Err(AssetError::Forbidden)
        ));
        assert!(matches!(
            resolve_under_root(root, "/sub/../../x.png"),
            Err(AssetError::Forbidden)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_confine_follows_symlinks() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.nd"), "secret").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("a.nd"), "a").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.nd"), dir.path().join("evil.nd"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("elsewhere")).unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();

        assert_eq!(
            confine(dir.path(), &dir.path().join("sub").join("a.nd")).await.unwrap(),
            root.join("sub").join("a.nd")
        );
        // Missing files are fine as long as their directory is inside
        assert_eq!(
            confine(dir.path(), &dir.path().join("new").join("b.nd")).await.unwrap(),
            root.join("new").join("b.nd")
        );
        assert!(matches!(
            confine(dir.path(), &dir.path().join("evil.nd")).await,
            Err(AssetError::Forbidden)
        ));
        assert!(matches!(
            confine(dir.path(), &dir.path().join("elsewhere").join("new.nd")).await,
            Err(AssetError::Forbidden)
        ));
    }

    #[test]
    fn test_resolve_rejects_malformed() {
        let root = Path::new("/srv/notes");
        assert!(matches!(
            resolve_under_root(root, ""),
            Err(AssetError::BadPath(_))
        ));
        // %FF is not valid UTF-8 once decoded
        assert!(matches!(
            resolve_under_root(root, "/%FF.nd"),
            Err(AssetError::BadPath(_))
        ));
        assert!(matches!(
            resolve_under_root(root, "/a%00.nd"),
            Err(AssetError::BadPath(_))
        ));
    }
}
