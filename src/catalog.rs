//! Catalog of finished downloads.
//!
//! The catalog is a single UTF-8 JSON array on disk. Every mutation reads the whole
//! document and rewrites it; a blank or malformed document heals itself back to `[]`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// URL prefix under which downloaded files are served
pub const DOWNLOADS_PREFIX: &str = "/downloads";

const EMPTY_CATALOG: &str = "[]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub title: String,
    pub filesize: String,
    pub local_path: String,
    pub download_time: String,
}

impl VideoRecord {
    /// Web path for a file stored in the download directory
    pub fn local_path_for(file_name: &str) -> String {
        format!("{DOWNLOADS_PREFIX}/{file_name}")
    }
}

/// Maps a `/downloads/<file>` web path back to the bare file name.
///
/// Returns `None` for anything that does not point directly into the download directory.
pub fn file_name_from_local_path(local_path: &str) -> Option<&str> {
    let name = local_path
        .strip_prefix(DOWNLOADS_PREFIX)?
        .strip_prefix('/')?;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".."
    {
        return None;
    }
    Some(name)
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the document (and its parent directory) as an empty list if absent
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn init(&self) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::info!("Catalog does not exist, creating empty list");
            tokio::fs::write(&self.path, EMPTY_CATALOG).await?;
        }
        Ok(())
    }

    /// Reads every record. Never fails; unusable or unreadable documents read as empty.
    pub async fn load(&self) -> Vec<VideoRecord> {
        let _guard = self.write_lock.lock().await;
        match self.load_unlocked().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(path = %self.path.display(), "Error loading catalog: {}", e);
                Vec::new()
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn append(&self, record: VideoRecord) -> Result<(), CatalogError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_unlocked().await?;
        records.push(record);
        self.write_all(&records).await?;
        tracing::debug!(count = records.len(), "Appended catalog record");
        Ok(())
    }

    /// Drops every record whose `local_path` equals `local_path`, returning how many went
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn remove(&self, local_path: &str) -> Result<usize, CatalogError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_unlocked().await?;
        let before = records.len();
        records.retain(|r| r.local_path != local_path);
        let removed = before - records.len();
        self.write_all(&records).await?;
        tracing::info!(removed, "Updated catalog");
        Ok(removed)
    }

    /// Missing, blank and malformed documents heal to an empty list. Other read
    /// failures are returned so callers never overwrite a catalog they could not read.
    async fn load_unlocked(&self) -> Result<Vec<VideoRecord>, CatalogError> {
        // Raw bytes, so invalid UTF-8 heals like any other malformed content
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.reset().await;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            self.reset().await;
            return Ok(Vec::new());
        }

        Ok(match serde_json::from_slice(&content) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Invalid JSON in catalog, resetting file: {}",
                    e
                );
                self.reset().await;
                Vec::new()
            }
        })
    }

    async fn reset(&self) {
        if let Err(e) = tokio::fs::write(&self.path, EMPTY_CATALOG).await {
            tracing::error!(path = %self.path.display(), "Failed to reset catalog: {}", e);
        }
    }

    async fn write_all(&self, records: &[VideoRecord]) -> Result<(), CatalogError> {
        let json = serde_json::to_string_pretty(records)?;
        // Write next to the target and rename so readers never see a half-written file
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
