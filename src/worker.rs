//! Background download worker.
//!
//! One spawned blocking task per job. The worker is the sole writer for its
//! job id; every outcome, including panics-adjacent failures like a missing
//! binary, ends up as registry state rather than propagating anywhere.

use crate::config::Config;
use crate::extract::{self, DownloadRequest, ExtractError, FormatProfile, ProgressEvent};
use crate::state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Percent reported once the download is done and the transcode has started.
const CONVERTING_PERCENT: f32 = 99.0;

/// Launch the download pipeline for a job on its own blocking task.
///
/// Returns immediately; completion is observed by polling the registry.
pub fn spawn_download(
    state: Arc<AppState>,
    config: Arc<Config>,
    ffmpeg: Option<PathBuf>,
    job_id: Uuid,
    url: String,
    profile: FormatProfile,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        match run_pipeline(&state, &config, ffmpeg, job_id, &url, profile) {
            Ok(filename) => {
                tracing::info!("Job {} finished: {}", job_id, filename);
                state.finish_job(job_id, filename);
            }
            Err(e) => {
                tracing::warn!("Job {} failed: {}", job_id, e);
                state.fail_job(job_id, &e.to_string());
            }
        }
    })
}

fn run_pipeline(
    state: &AppState,
    config: &Config,
    ffmpeg: Option<PathBuf>,
    job_id: Uuid,
    url: &str,
    profile: FormatProfile,
) -> Result<String, ExtractError> {
    std::fs::create_dir_all(&config.download.output_dir)?;

    let request = DownloadRequest {
        url: url.to_string(),
        profile,
        output_dir: config.download.output_dir.clone(),
        cookie_file: Some(config.download.cookie_file.clone()),
        browser_cookie_fallback: config.download.browser_cookie_fallback.clone(),
        audio_bitrate: config.download.audio_bitrate.clone(),
        // Only needed when ffmpeg was found off PATH.
        ffmpeg_location: ffmpeg.filter(|_| which::which("ffmpeg").is_err()),
    };

    let final_path = extract::run_download(&request, |event| match event {
        ProgressEvent::Percent(p) => state.update_percent(job_id, p),
        ProgressEvent::Converting => state.update_percent(job_id, CONVERTING_PERCENT),
    })?;

    let filename = final_path
        .file_name()
        .ok_or(ExtractError::NoDestination)?
        .to_string_lossy()
        .into_owned();

    Ok(filename)
}
