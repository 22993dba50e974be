//! Module for downloading videos through an external media engine
//!
//! This module provides the yt-dlp adapter, the orchestrator that turns one URL into a
//! catalog record, and the background queue the HTTP layer submits work to.

mod models;
mod orchestrator;
mod queue;
pub mod ytdlp;

// Re-export the public API
pub use models::{DownloadOptions, DownloadOutcome, DownloadState, ProgressEvent};
pub use orchestrator::Orchestrator;
pub use queue::DownloadQueue;
pub use ytdlp::{MediaEngine, YtDlp};
