//! Linkwatch - binary entry point

use anyhow::Context;
use linkwatch::{server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,linkwatch=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    if let Some(dir) = std::path::Path::new(&config.state_file).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).context("failed to create state directory")?;
        }
    }

    server::run_server(config).await
}
