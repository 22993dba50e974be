//! Background download pool
//!
//! Downloads are spawned onto a [`TaskTracker`] so the server can hand back a response
//! right away while still being able to wait for in-flight work on shutdown.

use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span};

use super::DownloadOutcome;
use super::orchestrator::Orchestrator;

#[derive(Debug, Clone, Default)]
pub struct DownloadQueue {
    tracker: TaskTracker,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a download in the background and return immediately
    pub fn start_download_in_background(&self, orchestrator: Arc<Orchestrator>, url: String) {
        orchestrator.progress().mark_pending(&url);
        info!(url = %url, active = self.active() + 1, "Adding download to queue");

        let span = info_span!("download_task", url = %url);
        self.tracker.spawn(
            async move {
                match orchestrator.submit(&url).await {
                    DownloadOutcome::Saved(record) => {
                        info!(path = %record.local_path, "Background download completed");
                    }
                    DownloadOutcome::Failed { error } => {
                        error!(error = %error, "Background download failed");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Number of downloads still running
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting new work and waits for running downloads to finish
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(active = self.tracker.len(), "Waiting for downloads to finish");
        }
        self.tracker.wait().await;
    }
}
