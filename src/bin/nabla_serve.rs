use anyhow::Context;
use clap::Parser;
use nabla_serve::{cli::Args, create_server};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nabla_serve=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = args.into_config()?;
    config.root = std::fs::canonicalize(&config.root)
        .with_context(|| format!("cannot serve {}", config.root.display()))?;
    tracing::info!("Running on: {}", config.root.display());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;

    create_server(config)?.listen(addr).await?;
    Ok(())
}
