//! Services shared by every request handler

use std::{path::PathBuf, sync::Arc};

use tera::Tera;

use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::downloader::{DownloadOptions, DownloadQueue, MediaEngine, Orchestrator, YtDlp};
use crate::progress::ProgressTracker;

pub const INDEX_TEMPLATE: &str = "index.html";

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub progress: Arc<ProgressTracker>,
    pub orchestrator: Arc<Orchestrator>,
    pub queue: DownloadQueue,
    pub templates: Arc<Tera>,
    pub download_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        catalog: CatalogStore,
        options: DownloadOptions,
        static_dir: PathBuf,
    ) -> tera::Result<Self> {
        let catalog = Arc::new(catalog);
        let progress = Arc::new(ProgressTracker::new());
        let download_dir = options.output_dir.clone();
        let orchestrator = Arc::new(Orchestrator::new(
            engine,
            catalog.clone(),
            progress.clone(),
            options,
        ));

        Ok(Self {
            catalog,
            progress,
            orchestrator,
            queue: DownloadQueue::new(),
            templates: Arc::new(templates()?),
            download_dir,
            static_dir,
        })
    }

    /// Builds the state from configuration, creating the download directory and catalog
    pub async fn from_config(config: &Config) -> color_eyre::Result<Self> {
        let storage = &config.storage;

        if !storage.download_dir.exists() {
            tracing::info!(
                "Directory '{}' does not exist, creating...",
                storage.download_dir.display()
            );
            tokio::fs::create_dir_all(&storage.download_dir).await?;
        }

        let catalog = CatalogStore::new(&storage.catalog_file);
        catalog.init().await?;

        let engine = Arc::new(YtDlp::new(&config.engine.ytdlp_bin));
        let options = DownloadOptions::from_config(storage, &config.engine);

        Ok(Self::new(
            engine,
            catalog,
            options,
            storage.static_dir.clone(),
        )?)
    }
}

fn templates() -> tera::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(INDEX_TEMPLATE, include_str!("../templates/index.html"))?;
    Ok(tera)
}
