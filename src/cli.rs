use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConfigError, ServerConfig};

/// CLI arguments for the server.
///
/// Flags override values from `--config`; anything left unset falls back to
/// the config file, then to the built-in defaults.
#[derive(Parser, Debug, Default)]
#[clap(name = "nabla-serve")]
#[clap(about = "Serve nabladown (.nd) files rendered with hot reload", long_about = None)]
#[clap(version)]
pub struct Args {
    /// Port to listen on [default: 3000]
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Host to bind to [default: 127.0.0.1]
    #[clap(long)]
    pub host: Option<String>,

    /// Directory to serve [default: current directory]
    #[clap(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Maximum directory depth shown in the listing [default: 3]
    #[clap(short, long)]
    pub depth: Option<usize>,

    /// Poll interval in milliseconds [default: 100]
    #[clap(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Document extension [default: nd]
    #[clap(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// URL path of a local stylesheet to link from every page (e.g. /style.css)
    #[clap(long, value_name = "URL_PATH")]
    pub stylesheet: Option<String>,

    /// JSON config file
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Resolve the effective configuration.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(extension) = self.extension {
            config.extension = extension;
        }
        if self.stylesheet.is_some() {
            config.stylesheet = self.stylesheet;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::parse_from(["nabla-serve"]);
        assert_eq!(args.into_config().unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_port_flag() {
        let args = Args::parse_from(["nabla-serve", "--port", "4000"]);
        assert_eq!(args.into_config().unwrap().port, 4000);

        let args = Args::parse_from(["nabla-serve", "-p", "4001"]);
        assert_eq!(args.into_config().unwrap().port, 4001);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nabla.json");
        std::fs::write(
            &path,
            r#"{"port": 8080, "depth": 5, "stylesheet": "/theme.css"}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "nabla-serve",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9000",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.depth, 5);
        assert_eq!(config.stylesheet.as_deref(), Some("/theme.css"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let args = Args::parse_from(["nabla-serve", "--poll-interval-ms", "0"]);
        assert!(args.into_config().is_err());
    }
}
