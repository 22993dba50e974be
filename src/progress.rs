//! In-memory download progress keyed by source URL.
//!
//! Entries are created on submission and updated from engine callbacks. They are never
//! evicted and do not survive a restart.

use regex::Regex;
use std::{
    collections::HashMap,
    sync::{LazyLock, RwLock},
};

use crate::downloader::{DownloadState, ProgressEvent};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI regex"));

/// Parses an engine percentage string such as `"\x1b[0;94m 42.5%\x1b[0m"` into `42.5`
pub fn parse_percent(raw: &str) -> Option<f64> {
    let cleaned = ANSI_ESCAPE.replace_all(raw, "");
    let trimmed = cleaned.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub percent: f64,
    pub state: DownloadState,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    entries: RwLock<HashMap<String, ProgressEntry>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `percent` for `id`, marking it as downloading
    pub fn record(&self, id: &str, percent: f64) {
        self.update(id, |entry| {
            entry.percent = percent;
            entry.state = DownloadState::Downloading;
            entry.error = None;
        });
    }

    /// Percentage for `id`, `0` when nothing was recorded
    pub fn read(&self, id: &str) -> f64 {
        self.entry(id).map(|e| e.percent).unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn status(&self, id: &str) -> Option<DownloadState> {
        self.entry(id).map(|e| e.state)
    }

    pub fn entry(&self, id: &str) -> Option<ProgressEntry> {
        match self.entries.read() {
            Ok(entries) => entries.get(id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(id).cloned(),
        }
    }

    /// Applies an engine callback event
    pub fn apply(&self, id: &str, event: ProgressEvent) {
        match event {
            ProgressEvent::Downloading { percent_str } => match parse_percent(&percent_str) {
                Some(percent) => self.record(id, percent),
                None => tracing::trace!(url = %id, raw = %percent_str, "Unparseable progress"),
            },
            ProgressEvent::Finished => self.record(id, 100.0),
        }
    }

    /// Resets `id` to 0% in the pending state, used when a URL is (re)submitted
    pub fn mark_pending(&self, id: &str) {
        self.update(id, |entry| {
            *entry = ProgressEntry {
                percent: 0.0,
                state: DownloadState::Pending,
                error: None,
            };
        });
    }

    pub fn mark_done(&self, id: &str) {
        self.update(id, |entry| {
            entry.percent = 100.0;
            entry.state = DownloadState::Done;
            entry.error = None;
        });
    }

    /// Keeps the last percentage so a stalled download stays visible
    pub fn mark_failed(&self, id: &str, message: impl Into<String>) {
        let message = message.into();
        self.update(id, |entry| {
            entry.state = DownloadState::Error;
            entry.error = Some(message);
        });
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut ProgressEntry)) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries.entry(id.to_string()).or_insert(ProgressEntry {
            percent: 0.0,
            state: DownloadState::Pending,
            error: None,
        });
        f(entry);
    }
}
