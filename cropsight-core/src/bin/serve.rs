use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cropsight_core::{
    api::{AppState, start_server},
    config::ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::parse();
    info!("Dataset root: {}", config.pipeline.dataset_root.display());
    info!("Static root: {}", config.pipeline.static_root.display());
    info!("Models dir: {}", config.pipeline.models_dir.display());

    std::fs::create_dir_all(&config.pipeline.static_root)?;

    let state = AppState::new(config.pipeline.registry(), config.pipeline.runner()?);
    start_server(config.bind, state).await?;

    Ok(())
}
