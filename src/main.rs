mod catalog;
mod config;
mod downloader;
mod error;
mod progress;
mod router;
mod state;
mod util;

use router::create_router;
use state::AppState;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vidshelf=debug"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    init_tracing();

    let config = config::config();
    tracing::debug!(?config, "Loaded configuration");

    let state = AppState::from_config(&config).await?;
    tracing::info!(
        download_dir = %state.download_dir.display(),
        catalog = %state.catalog.path().display(),
        format = %state.orchestrator.options().format,
        "Storage ready"
    );

    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.host).await?;
    tracing::info!("Listening on: {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.queue.shutdown().await;
    tracing::info!("All downloads settled, exiting");
    Ok(())
}
