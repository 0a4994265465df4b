use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the web UI; served with an index.html fallback.
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Where finished artifacts land; created at startup if absent.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Netscape cookie file passed to yt-dlp when it exists.
    #[serde(default = "default_cookie_file")]
    pub cookie_file: PathBuf,

    /// Opt-in: borrow cookies from a local browser profile when no cookie
    /// file is present. Best-effort; a missing profile is silently skipped.
    #[serde(default)]
    pub browser_cookie_fallback: Option<String>,

    /// Target mp3 bitrate handed to the transcode step.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// How long finished/failed jobs stay visible to polling clients.
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: u64,

    /// How often the registry sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("static"))
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_cookie_file() -> PathBuf {
    PathBuf::from("cookies.txt")
}
fn default_audio_bitrate() -> String {
    "192K".to_string()
}
fn default_retention_minutes() -> u64 {
    60
}
fn default_sweep_interval() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            cookie_file: default_cookie_file(),
            browser_cookie_fallback: None,
            audio_bitrate: default_audio_bitrate(),
            retention_minutes: default_retention_minutes(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}
