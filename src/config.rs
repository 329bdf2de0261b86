use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::snapshot::DEFAULT_DEPTH;

/// Extensions served raw by the static-asset rule.
pub const STATIC_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "svg", "bmp", "tiff", "tif", "mp4", "webm", "ogv", "ogg",
    "js", "mjs", "css",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid document extension: {0:?}")]
    InvalidExtension(String),
    #[error("poll interval must be greater than zero")]
    InvalidInterval,
    #[error("invalid route pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Server configuration. Every component gets the root from here; nothing
/// reads the process working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum directory depth of the listing
    #[serde(default = "default_depth")]
    pub depth: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Document extension, without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// URL path of a local stylesheet linked from every page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_extension() -> String {
    "nd".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            host: default_host(),
            port: default_port(),
            depth: default_depth(),
            poll_interval_ms: default_poll_interval_ms(),
            extension: default_extension(),
            stylesheet: None,
        }
    }
}

impl ServerConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = self.extension.trim_start_matches('.');
        if ext.is_empty() || ext.contains('/') || ext.contains('\\') {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// File-name suffix of documents, e.g. `.nd`.
    pub fn document_suffix(&self) -> String {
        format!(".{}", self.extension.trim_start_matches('.'))
    }

    /// Route pattern for document paths.
    pub fn document_pattern(&self) -> String {
        format!(r"^.*{}$", regex::escape(&self.document_suffix()))
    }

    /// Route pattern for static assets.
    pub fn static_pattern(&self) -> String {
        format!(r"^.*\.({})$", STATIC_EXTENSIONS.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.depth, 3);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.document_suffix(), ".nd");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nabla.json");
        std::fs::write(&path, r#"{"port": 8080, "extension": ".md"}"#).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.document_suffix(), ".md");
        assert_eq!(config.stylesheet, None);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ServerConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServerConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = ServerConfig::default();
        config.extension = ".".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExtension(_))
        ));

        let mut config = ServerConfig::default();
        config.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval)));
    }

    #[test]
    fn test_patterns() {
        let config = ServerConfig::default();
        let doc = regex::Regex::new(&config.document_pattern()).unwrap();
        assert!(doc.is_match("/sub/b.nd"));
        assert!(!doc.is_match("/sub/bxnd"));
        assert!(!doc.is_match("/b.nd.txt"));

        let assets = regex::Regex::new(&config.static_pattern()).unwrap();
        assert!(assets.is_match("/img/logo.png"));
        assert!(assets.is_match("/style.css"));
        assert!(!assets.is_match("/b.nd"));
    }
}
