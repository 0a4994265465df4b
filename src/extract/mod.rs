//! yt-dlp subprocess wrapper.
//!
//! Everything that actually talks to the extraction binary lives here:
//! metadata lookup (`--dump-single-json`), the download invocation with its
//! format profiles and cookie handling, and the line-oriented progress
//! protocol parsed from yt-dlp's `--newline` output.
//!
//! All functions in this module block on subprocess I/O; callers run them on
//! a blocking task.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

const YTDLP_BIN: &str = "yt-dlp";

/// How many trailing stderr lines to keep for error reporting.
const STDERR_TAIL: usize = 40;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to launch yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("yt-dlp failed ({status}): {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("invalid metadata from yt-dlp: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine output filename")]
    NoDestination,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Reduced metadata record for a media URL.
#[derive(Debug, Clone, Serialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<String>,
    pub uploader: Option<String>,
}

#[derive(Deserialize)]
struct RawInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    duration_string: Option<String>,
    uploader: Option<String>,
}

impl From<RawInfo> for MediaMetadata {
    fn from(raw: RawInfo) -> Self {
        Self {
            title: raw.title,
            thumbnail: raw.thumbnail,
            duration: raw.duration_string,
            uploader: raw.uploader,
        }
    }
}

/// Fetch metadata for a URL without downloading anything.
pub fn fetch_metadata(url: &str) -> Result<MediaMetadata, ExtractError> {
    let output = Command::new(YTDLP_BIN)
        .args(["--dump-single-json", "--skip-download", "--no-warnings", url])
        .output()
        .map_err(ExtractError::Spawn)?;

    if !output.status.success() {
        return Err(ExtractError::Failed {
            status: output.status,
            stderr: stderr_tail(&String::from_utf8_lossy(&output.stderr)),
        });
    }

    let raw: RawInfo = serde_json::from_slice(&output.stdout)?;
    Ok(raw.into())
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// The audio-vs-video policy: stream selection and output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatProfile {
    /// Best audio stream, transcoded to mp3.
    Audio,
    /// Best video+audio streams, merged into mp4.
    Video,
}

impl FormatProfile {
    /// Parse the request's `type` field. Anything but `"video"` means audio.
    pub fn from_type(format_type: Option<&str>) -> Self {
        match format_type {
            Some("video") => FormatProfile::Video,
            _ => FormatProfile::Audio,
        }
    }

    /// Extension of the file the post-processing step produces.
    pub fn output_ext(self) -> &'static str {
        match self {
            FormatProfile::Audio => "mp3",
            FormatProfile::Video => "mp4",
        }
    }
}

/// One download invocation.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub profile: FormatProfile,
    pub output_dir: PathBuf,
    /// Netscape cookie file, used when it exists on disk.
    pub cookie_file: Option<PathBuf>,
    /// Browser to borrow cookies from when no cookie file is present.
    pub browser_cookie_fallback: Option<String>,
    /// Target bitrate for the mp3 transcode, e.g. `192K`.
    pub audio_bitrate: String,
    /// Explicit ffmpeg location when it was found off PATH.
    pub ffmpeg_location: Option<PathBuf>,
}

/// Progress ticks surfaced to the caller while a download runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// A `[download]` percentage line.
    Percent(f32),
    /// Download done, post-processing (transcode/merge) has started.
    Converting,
}

/// Build the yt-dlp argument list for a request.
pub fn build_args(req: &DownloadRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--no-playlist".into(),
        "-o".into(),
        req.output_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned(),
    ];

    // Cookie file wins; the browser fallback is best-effort and only added
    // when the browser's cookie store actually exists, so a missing profile
    // can never fail the job.
    match &req.cookie_file {
        Some(file) if file.exists() => {
            args.push("--cookies".into());
            args.push(file.to_string_lossy().into_owned());
        }
        _ => {
            if let Some(browser) = &req.browser_cookie_fallback {
                if browser_cookie_store_exists(browser) {
                    args.push("--cookies-from-browser".into());
                    args.push(browser.clone());
                }
            }
        }
    }

    match req.profile {
        FormatProfile::Video => {
            args.extend([
                "-f".into(),
                "bestvideo+bestaudio/best".into(),
                "--merge-output-format".into(),
                "mp4".into(),
            ]);
        }
        FormatProfile::Audio => {
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "--extract-audio".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                req.audio_bitrate.clone(),
            ]);
        }
    }

    if let Some(ffmpeg) = &req.ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.to_string_lossy().into_owned());
    }

    args.push(req.url.clone());
    args
}

/// Run a download to completion, reporting progress ticks via `on_progress`.
///
/// Returns the final output path. The post-processor's announced target
/// (merge or audio extraction) is authoritative when present; otherwise the
/// download destination with the extension swapped to the profile's output
/// format. The filesystem is not re-inspected; this follows the same naming
/// convention the extractor itself used.
pub fn run_download<F>(req: &DownloadRequest, on_progress: F) -> Result<PathBuf, ExtractError>
where
    F: Fn(ProgressEvent),
{
    let args = build_args(req);
    tracing::debug!("yt-dlp args: {:?}", args);

    let mut child = Command::new(YTDLP_BIN)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ExtractError::Spawn)?;

    // Collect a bounded stderr tail on a side thread for error reporting.
    let stderr_handle = child.stderr.take().map(|stream| {
        std::thread::spawn(move || {
            let mut tail: VecDeque<String> = VecDeque::new();
            for line in BufReader::new(stream).lines().map_while(Result::ok) {
                tracing::debug!("yt-dlp stderr: {}", line);
                tail.push_back(line);
                if tail.len() > STDERR_TAIL {
                    tail.pop_front();
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        })
    });

    let mut scan = OutputScan::default();
    let mut emit = |event| on_progress(event);

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            scan.feed(&line, &mut emit);
        }
    }

    let status = child.wait()?;
    let stderr = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    if !status.success() {
        return Err(ExtractError::Failed { status, stderr });
    }

    scan.into_output(req.profile).ok_or(ExtractError::NoDestination)
}

/// Running state accumulated over yt-dlp's stdout lines.
///
/// A video job downloads each stream to a format-suffixed intermediate
/// (`Title.f616.mp4`, `Title.f140.m4a`) before the merger writes `Title.mp4`,
/// so the last `[download] Destination:` alone names a file that won't exist
/// afterwards. The post-processor target always wins when announced.
#[derive(Default)]
struct OutputScan {
    download_dest: Option<PathBuf>,
    final_dest: Option<PathBuf>,
    converting: bool,
}

impl OutputScan {
    fn feed(&mut self, line: &str, on_progress: &mut impl FnMut(ProgressEvent)) {
        if let Some(dest) = parse_postprocess_destination(line) {
            self.final_dest = Some(PathBuf::from(dest));
            self.mark_converting(on_progress);
        } else if let Some(dest) = parse_destination(line) {
            self.download_dest = Some(PathBuf::from(dest));
        } else if is_postprocess_line(line) {
            self.mark_converting(on_progress);
        } else if let Some(percent) = parse_percent(line) {
            on_progress(ProgressEvent::Percent(percent));
        }
    }

    fn mark_converting(&mut self, on_progress: &mut impl FnMut(ProgressEvent)) {
        if !self.converting {
            self.converting = true;
            on_progress(ProgressEvent::Converting);
        }
    }

    fn into_output(self, profile: FormatProfile) -> Option<PathBuf> {
        self.final_dest.or_else(|| {
            self.download_dest
                .map(|dest| dest.with_extension(profile.output_ext()))
        })
    }
}

// ---------------------------------------------------------------------------
// Progress protocol
// ---------------------------------------------------------------------------

/// Parse the percentage out of a `[download]  42.3% of ...` line.
///
/// Best-effort: anything that doesn't parse is simply not a progress tick.
pub(crate) fn parse_percent(line: &str) -> Option<f32> {
    let rest = line.strip_prefix("[download]")?.trim_start();
    let token = rest.split_whitespace().next()?;
    let value: f32 = token.strip_suffix('%')?.parse().ok()?;
    (0.0..=100.0).contains(&value).then_some(value)
}

/// Pull the output path from a destination announcement.
///
/// Covers both the normal `Destination:` line and the short-circuit line
/// yt-dlp prints when the file is already on disk.
pub(crate) fn parse_destination(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("[download] Destination:") {
        return Some(rest.trim());
    }
    line.strip_prefix("[download] ")
        .and_then(|rest| rest.strip_suffix(" has already been downloaded"))
        .map(str::trim)
}

/// Lines that mark the start of the post-processing (transcode) phase.
pub(crate) fn is_postprocess_line(line: &str) -> bool {
    line.starts_with("[ExtractAudio]")
        || line.starts_with("[Merger]")
        || line.starts_with("[VideoConvertor]")
}

/// Pull the final artifact path out of a post-processor announcement.
pub(crate) fn parse_postprocess_destination(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        return rest.strip_suffix('"');
    }
    line.strip_prefix("[ExtractAudio] Destination:")
        .or_else(|| line.strip_prefix("[VideoConvertor] Destination:"))
        .map(str::trim)
}

/// Best-effort check that a browser actually has a cookie store on this host.
fn browser_cookie_store_exists(browser: &str) -> bool {
    let candidates: &[&str] = match browser {
        "chrome" => &[
            "~/.config/google-chrome/Default/Cookies",
            "~/Library/Application Support/Google/Chrome/Default/Cookies",
            "~/AppData/Local/Google/Chrome/User Data/Default/Network/Cookies",
        ],
        "chromium" => &[
            "~/.config/chromium/Default/Cookies",
            "~/Library/Application Support/Chromium/Default/Cookies",
        ],
        "firefox" => &[
            "~/.mozilla/firefox",
            "~/Library/Application Support/Firefox/Profiles",
            "~/AppData/Roaming/Mozilla/Firefox/Profiles",
        ],
        _ => return false,
    };

    candidates.iter().any(|candidate| {
        let expanded = shellexpand::tilde(candidate);
        Path::new(expanded.as_ref()).exists()
    })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL);
    lines[start..].join("\n")
}
