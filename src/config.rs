//! Config module for vidshelf

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct StorageConfig {
    /// Directory downloaded media is written to and served from
    #[clap(long, env = "VIDSHELF_DOWNLOAD_DIR", default_value = "downloads")]
    pub download_dir: PathBuf,

    /// JSON document holding the catalog of finished downloads
    #[clap(long, env = "VIDSHELF_CATALOG_FILE", default_value = "video_info.json")]
    pub catalog_file: PathBuf,

    /// Directory with the front-end assets mounted under /static
    #[clap(long, env = "VIDSHELF_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct EngineConfig {
    /// Path or name of the yt-dlp executable
    #[clap(long = "ytdlp", env = "VIDSHELF_YTDLP", default_value = "yt-dlp")]
    pub ytdlp_bin: PathBuf,

    /// yt-dlp format selector
    #[clap(long, env = "VIDSHELF_FORMAT", default_value = "best")]
    pub format: String,

    /// Per-connection socket timeout, in seconds
    #[clap(long, env = "VIDSHELF_SOCKET_TIMEOUT", default_value_t = 30)]
    pub socket_timeout: u64,

    /// Retry count for transient network failures
    #[clap(long, env = "VIDSHELF_RETRIES", default_value_t = 10)]
    pub retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            format: "best".to_string(),
            socket_timeout: 30,
            retries: 10,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Config {
    #[clap(long, env = "VIDSHELF_HOST", default_value = "0.0.0.0:8000")]
    pub host: String,

    #[clap(flatten)]
    pub storage: StorageConfig,

    #[clap(flatten)]
    pub engine: EngineConfig,
}

pub fn config() -> Config {
    Config::parse()
}
