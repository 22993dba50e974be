//! Data structures for the download system
//!
//! Progress events emitted by the media engine, per-URL lifecycle states, the options
//! handed to the engine and the outcome of a single download.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::catalog::{CatalogError, VideoRecord};
use crate::config::{EngineConfig, StorageConfig};

/// Lifecycle of a submitted URL
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// Accepted by the queue, engine not started yet
    #[default]
    Pending,
    /// Engine is transferring data
    Downloading,
    /// Record has been written to the catalog
    Done,
    /// Orchestrator gave up, see the attached message
    Error,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Downloading => write!(f, "downloading"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Event reported by the media engine while a download runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Raw percentage string as printed by the engine, e.g. `"\x1b[0;94m 42.1%\x1b[0m"`
    Downloading { percent_str: String },
    /// The engine finished writing the file
    Finished,
}

/// Callback the engine invokes for every progress event
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Options handed to the media engine for one download
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    /// File name template relative to `output_dir`
    pub output_template: String,
    pub format: String,
    pub socket_timeout: u64,
    pub retries: u32,
    pub no_playlist: bool,
    pub restrict_filenames: bool,
}

impl DownloadOptions {
    pub const DEFAULT_TEMPLATE: &'static str = "%(title)s.%(ext)s";

    pub fn new(output_dir: impl AsRef<Path>, engine: &EngineConfig) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            output_template: Self::DEFAULT_TEMPLATE.to_string(),
            format: engine.format.clone(),
            socket_timeout: engine.socket_timeout,
            retries: engine.retries,
            no_playlist: true,
            restrict_filenames: true,
        }
    }

    pub fn from_config(storage: &StorageConfig, engine: &EngineConfig) -> Self {
        Self::new(&storage.download_dir, engine)
    }

    /// Full output template, e.g. `downloads/%(title)s.%(ext)s`
    pub fn output_path_template(&self) -> String {
        self.output_dir
            .join(&self.output_template)
            .to_string_lossy()
            .into_owned()
    }
}

/// Metadata extracted from a URL before downloading
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    #[serde(default)]
    pub ext: Option<String>,
    /// Output path the engine will write to, when it reports one
    #[serde(default, rename = "_filename")]
    pub filename: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("media engine `{0}` was not found")]
    EngineNotFound(String),

    #[error("metadata extraction failed: {0}")]
    Metadata(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to save catalog record: {0}")]
    Catalog(#[from] CatalogError),
}

/// Result of one orchestrated download, serialized as the record or `{"error": ..}`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DownloadOutcome {
    Saved(VideoRecord),
    Failed { error: String },
}

#[cfg(test)]
impl DownloadOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Saved(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&DownloadState::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
        assert_eq!(DownloadState::Error.to_string(), "error");
    }

    #[test]
    fn test_output_path_template() {
        let opts = DownloadOptions::new("downloads", &EngineConfig::default());
        assert_eq!(opts.output_path_template(), "downloads/%(title)s.%(ext)s");
        assert!(opts.no_playlist);
    }

    #[test]
    fn test_failed_outcome_shape() {
        let outcome = DownloadOutcome::Failed {
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "boom" }));
        assert_eq!(outcome.error_message(), Some("boom"));
    }

    #[test]
    fn test_metadata_reads_engine_filename() {
        let raw = r#"{"title": "Clip", "ext": "mp4", "_filename": "downloads/Clip.mp4", "id": "x"}"#;
        let meta: MediaMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.filename.as_deref(), Some("downloads/Clip.mp4"));
        assert_eq!(meta.ext.as_deref(), Some("mp4"));
    }
}
