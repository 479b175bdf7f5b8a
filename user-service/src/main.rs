use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::config::Config;
use user_service::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.server.log_level.clone())),
        )
        .init();

    let app = App::start(cfg).await?;
    info!("User service started. Waiting for shutdown signal (Ctrl+C)...");

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal. Shutting down gracefully...");

    app.shutdown().await?;
    Ok(())
}
