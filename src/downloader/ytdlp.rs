//! yt-dlp backed media engine
//!
//! yt-dlp runs as a subprocess. Metadata comes from `--dump-json`; progress is read
//! line by line from stdout using a fixed `--progress-template`.

use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};

use super::models::{
    DownloadError, DownloadOptions, MediaMetadata, ProgressCallback, ProgressEvent,
};

/// Prefix of the progress lines yt-dlp prints with our template
const PROGRESS_PREFIX: &str = "download:";
/// Lines of stderr kept for error messages
const STDERR_TAIL_LINES: usize = 5;

/// Capabilities the orchestrator needs from an extraction/download engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Fetch metadata for `url` without downloading anything
    async fn extract_metadata(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<MediaMetadata, DownloadError>;

    /// Download `url` according to `options`, reporting progress through `on_progress`
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: ProgressCallback,
    ) -> Result<(), DownloadError>;

    /// Path the engine writes `metadata` to
    fn resolve_output_path(&self, metadata: &MediaMetadata, options: &DownloadOptions) -> PathBuf {
        match &metadata.filename {
            Some(filename) => PathBuf::from(filename),
            None => {
                let ext = metadata.ext.as_deref().unwrap_or("mp4");
                options
                    .output_dir
                    .join(format!("{}.{}", metadata.title, ext))
            }
        }
    }
}

pub struct YtDlp {
    bin: PathBuf,
}

impl YtDlp {
    pub fn new(bin: impl AsRef<Path>) -> Self {
        Self {
            bin: bin.as_ref().to_path_buf(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.kill_on_drop(true);
        cmd
    }

    fn map_spawn_error(&self, e: std::io::Error) -> DownloadError {
        if e.kind() == std::io::ErrorKind::NotFound {
            DownloadError::EngineNotFound(self.bin.display().to_string())
        } else {
            DownloadError::Io(e)
        }
    }
}

/// Arguments shared by metadata extraction and download, so both agree on the filename
pub fn common_args(options: &DownloadOptions) -> Vec<String> {
    let mut args = vec![
        "--format".to_string(),
        options.format.clone(),
        "--output".to_string(),
        options.output_path_template(),
        "--socket-timeout".to_string(),
        options.socket_timeout.to_string(),
        "--retries".to_string(),
        options.retries.to_string(),
    ];
    if options.no_playlist {
        args.push("--no-playlist".to_string());
    }
    if options.restrict_filenames {
        args.push("--restrict-filenames".to_string());
    }
    args
}

pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    let mut args = common_args(options);
    args.extend([
        "--newline".to_string(),
        "--progress-template".to_string(),
        format!("{PROGRESS_PREFIX}%(progress._percent_str)s"),
        "--".to_string(),
        url.to_string(),
    ]);
    args
}

/// Turns one stdout line into a progress event, if it is one
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim_start().strip_prefix(PROGRESS_PREFIX)?;
    Some(ProgressEvent::Downloading {
        percent_str: rest.to_string(),
    })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl MediaEngine for YtDlp {
    #[tracing::instrument(level = "debug", skip(self, options))]
    async fn extract_metadata(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<MediaMetadata, DownloadError> {
        let output = self
            .command()
            .arg("--dump-json")
            .args(common_args(options))
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::Metadata(stderr_tail(&stderr)));
        }

        // With --no-playlist a single JSON object is printed; take the first line anyway
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| DownloadError::Metadata("yt-dlp printed no metadata".to_string()))?;

        serde_json::from_str(first).map_err(|e| DownloadError::Metadata(e.to_string()))
    }

    #[tracing::instrument(level = "debug", skip(self, options, on_progress))]
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: ProgressCallback,
    ) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&options.output_dir).await?;

        let mut child = self
            .command()
            .args(download_args(url, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.map_spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::DownloadFailed("yt-dlp stdout unavailable".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::DownloadFailed("yt-dlp stderr unavailable".into()))?;

        // Drain stderr concurrently so a chatty engine can't block on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_progress_line(&line) {
                Some(event) => on_progress(event),
                None => tracing::trace!(line = %line, "yt-dlp"),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let tail = stderr_tail(&stderr);
            return Err(DownloadError::DownloadFailed(if tail.is_empty() {
                format!("yt-dlp exited with status: {status}")
            } else {
                tail
            }));
        }

        on_progress(ProgressEvent::Finished);
        Ok(())
    }
}

#[cfg(test)]
pub mod stub {
    //! Engine stand-in that writes a small file instead of touching the network

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct StubEngine {
        pub title: String,
        pub ext: String,
        pub body: Vec<u8>,
        /// Report success without writing the file
        pub skip_write: bool,
        pub fail_with: Option<String>,
        pub downloads: AtomicUsize,
    }

    impl StubEngine {
        pub fn new(title: &str) -> Self {
            Self {
                title: title.to_string(),
                ext: "mp4".to_string(),
                body: vec![0u8; 2048],
                skip_write: false,
                fail_with: None,
                downloads: AtomicUsize::new(0),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::new("Broken")
            }
        }

        pub fn download_count(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaEngine for StubEngine {
        async fn extract_metadata(
            &self,
            _url: &str,
            _options: &DownloadOptions,
        ) -> Result<MediaMetadata, DownloadError> {
            if let Some(msg) = &self.fail_with {
                return Err(DownloadError::Metadata(msg.clone()));
            }
            Ok(MediaMetadata {
                title: self.title.clone(),
                ext: Some(self.ext.clone()),
                filename: None,
            })
        }

        async fn download(
            &self,
            _url: &str,
            options: &DownloadOptions,
            on_progress: ProgressCallback,
        ) -> Result<(), DownloadError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            on_progress(ProgressEvent::Downloading {
                percent_str: "\x1b[0;94m 50.0%\x1b[0m".to_string(),
            });
            if !self.skip_write {
                tokio::fs::create_dir_all(&options.output_dir).await?;
                let path = options
                    .output_dir
                    .join(format!("{}.{}", self.title, self.ext));
                tokio::fs::write(path, &self.body).await?;
            }
            on_progress(ProgressEvent::Finished);
            Ok(())
        }
    }
}
