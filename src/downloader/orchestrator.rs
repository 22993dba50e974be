//! Runs one URL through extraction, download, verification and cataloging.

use std::{path::PathBuf, sync::Arc};

use super::models::{DownloadError, DownloadOptions, DownloadOutcome, ProgressCallback};
use super::ytdlp::MediaEngine;
use crate::catalog::{CatalogStore, VideoRecord};
use crate::progress::ProgressTracker;
use crate::util::{human_size, local_timestamp, sanitize_filename};

pub struct Orchestrator {
    engine: Arc<dyn MediaEngine>,
    catalog: Arc<CatalogStore>,
    progress: Arc<ProgressTracker>,
    options: DownloadOptions,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        catalog: Arc<CatalogStore>,
        progress: Arc<ProgressTracker>,
        options: DownloadOptions,
    ) -> Self {
        Self {
            engine,
            catalog,
            progress,
            options,
        }
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Downloads `url` and records it in the catalog.
    ///
    /// Failures are logged, reported to the progress tracker and returned as
    /// [`DownloadOutcome::Failed`]; they never escape as errors.
    pub async fn submit(&self, url: &str) -> DownloadOutcome {
        match self.run(url).await {
            Ok(record) => {
                self.progress.mark_done(url);
                tracing::info!(url = %url, title = %record.title, "Video downloaded and saved");
                DownloadOutcome::Saved(record)
            }
            Err(e) => {
                tracing::error!(url = %url, "Error downloading video: {}", e);
                let error = e.to_string();
                self.progress.mark_failed(url, error.clone());
                DownloadOutcome::Failed { error }
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn run(&self, url: &str) -> Result<VideoRecord, DownloadError> {
        tracing::info!("Extracting video info");
        let metadata = self.engine.extract_metadata(url, &self.options).await?;

        tracing::info!(title = %metadata.title, "Downloading video");
        let progress = self.progress.clone();
        let id = url.to_string();
        let callback: ProgressCallback = Box::new(move |event| progress.apply(&id, event));
        self.engine.download(url, &self.options, callback).await?;

        let raw_path = self.engine.resolve_output_path(&metadata, &self.options);
        let path = self.settle_filename(raw_path).await?;

        let file_meta = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                return Err(DownloadError::DownloadFailed(format!(
                    "file not found after download: {}",
                    path.display()
                )));
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let record = VideoRecord {
            title: metadata.title,
            filesize: human_size(file_meta.len()),
            local_path: VideoRecord::local_path_for(&file_name),
            download_time: local_timestamp(),
        };

        self.catalog.append(record.clone()).await?;
        Ok(record)
    }

    /// Sanitizes the file name component of `raw`, renaming the file on disk if needed
    async fn settle_filename(&self, raw: PathBuf) -> Result<PathBuf, DownloadError> {
        let raw_name = raw
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let clean_name = sanitize_filename(&raw_name);
        if clean_name.is_empty() {
            return Err(DownloadError::DownloadFailed(format!(
                "engine produced an unusable filename: {raw_name:?}"
            )));
        }

        let dir = raw
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.options.output_dir.clone());
        let clean = dir.join(&clean_name);

        if clean != raw
            && !tokio::fs::try_exists(&clean).await.unwrap_or(false)
            && tokio::fs::try_exists(&raw).await.unwrap_or(false)
        {
            tracing::debug!(from = %raw.display(), to = %clean.display(), "Renaming download");
            tokio::fs::rename(&raw, &clean).await?;
        }

        Ok(clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::downloader::DownloadState;
    use crate::downloader::ytdlp::stub::StubEngine;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        catalog: Arc<CatalogStore>,
        progress: Arc<ProgressTracker>,
        orchestrator: Orchestrator,
    }

    fn harness(engine: StubEngine) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(CatalogStore::new(dir.path().join("video_info.json")));
        let progress = Arc::new(ProgressTracker::new());
        let options = DownloadOptions::new(dir.path().join("downloads"), &EngineConfig::default());
        let orchestrator = Orchestrator::new(
            Arc::new(engine),
            catalog.clone(),
            progress.clone(),
            options,
        );
        Harness {
            dir,
            catalog,
            progress,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_submit_saves_record() {
        let h = harness(StubEngine::new("Sample Clip"));
        let url = "https://example.com/watch?v=abc";

        let outcome = h.orchestrator.submit(url).await;
        let DownloadOutcome::Saved(record) = &outcome else {
            panic!("expected saved outcome, got {outcome:?}");
        };

        assert_eq!(record.title, "Sample Clip");
        assert_eq!(record.local_path, "/downloads/Sample Clip.mp4");
        assert!(record.filesize.ends_with('B'));
        assert!(h.dir.path().join("downloads/Sample Clip.mp4").exists());

        let records = h.catalog.load().await;
        assert_eq!(records, vec![record.clone()]);
        assert_eq!(h.progress.read(url), 100.0);
        assert_eq!(h.progress.status(url), Some(DownloadState::Done));
    }

    #[tokio::test]
    async fn test_submit_renames_unsafe_filename() {
        let h = harness(StubEngine::new("What? Really."));

        let outcome = h.orchestrator.submit("https://example.com/q").await;
        let DownloadOutcome::Saved(record) = &outcome else {
            panic!("expected saved outcome, got {outcome:?}");
        };

        assert_eq!(record.local_path, "/downloads/What Really..mp4");
        assert!(h.dir.path().join("downloads/What Really..mp4").exists());
        assert!(!h.dir.path().join("downloads/What? Really..mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_not_raised() {
        let mut engine = StubEngine::new("Ghost");
        engine.skip_write = true;
        let h = harness(engine);
        let url = "https://example.com/ghost";

        let outcome = h.orchestrator.submit(url).await;
        let error = outcome.error_message().expect("should fail");
        assert!(error.contains("file not found"), "{error}");
        assert!(h.catalog.load().await.is_empty());
        assert_eq!(h.progress.status(url), Some(DownloadState::Error));
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_catalog_untouched() {
        let h = harness(StubEngine::failing("unsupported URL"));
        let url = "not a url";

        let outcome = h.orchestrator.submit(url).await;
        assert!(!outcome.is_saved());
        assert!(outcome.error_message().unwrap().contains("unsupported URL"));
        assert!(h.catalog.load().await.is_empty());

        let entry = h.progress.entry(url).unwrap();
        assert_eq!(entry.state, DownloadState::Error);
    }
}
