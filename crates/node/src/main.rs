// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use tracing::error;

use rosenbridge::config::NodeConfig;

#[tokio::main]
async fn main() {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = NodeConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = rosenbridge::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
