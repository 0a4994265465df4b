//! External tool detection.
//!
//! Both download profiles post-process through ffmpeg (mp3 extraction or
//! mp4 merging), so its presence is checked before any job is accepted.

use std::path::PathBuf;
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

impl ToolInfo {
    fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        }
    }
}

/// Probe a tool by running it with its version flag (yt-dlp takes
/// `--version`, ffmpeg `-version`).
pub fn check_tool(name: &str, version_arg: &str) -> ToolInfo {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => ToolInfo {
            name: name.to_string(),
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(str::to_string),
            path: which::which(name).ok(),
        },
        _ => ToolInfo::missing(name),
    }
}

/// Check the external tools the download pipeline depends on.
pub fn check_tools() -> Vec<ToolInfo> {
    let mut tools = vec![
        check_tool("yt-dlp", "--version"),
        check_tool("ffmpeg", "-version"),
    ];

    // PATH lookup missed ffmpeg; see if an installer put it somewhere known.
    if !tools[1].available {
        if let Some(path) = probe_ffmpeg_fallback() {
            tools[1] = ToolInfo {
                name: "ffmpeg".to_string(),
                available: true,
                version: None,
                path: Some(path),
            };
        }
    }

    tools
}

/// Locate ffmpeg, preferring PATH but falling back to well-known installer
/// locations. Returns `None` if it cannot be found at all.
pub fn find_ffmpeg() -> Option<PathBuf> {
    if let Ok(path) = which::which("ffmpeg") {
        return Some(path);
    }
    probe_ffmpeg_fallback()
}

/// Probe locations where common installers drop ffmpeg without touching PATH.
fn probe_ffmpeg_fallback() -> Option<PathBuf> {
    let fixed = [
        "/usr/local/bin/ffmpeg",
        "/opt/homebrew/bin/ffmpeg",
        "~/.local/bin/ffmpeg",
    ];
    for candidate in fixed {
        let expanded = shellexpand::tilde(candidate);
        let path = PathBuf::from(expanded.as_ref());
        if path.is_file() {
            return Some(path);
        }
    }

    // WinGet unpacks ffmpeg under a versioned package directory.
    let winget_root = shellexpand::tilde("~/AppData/Local/Microsoft/WinGet/Packages");
    let winget_root = PathBuf::from(winget_root.as_ref());
    if winget_root.is_dir() {
        for entry in walkdir::WalkDir::new(&winget_root)
            .max_depth(4)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && entry.file_name() == "ffmpeg.exe" {
                return Some(entry.into_path());
            }
        }
    }

    None
}
