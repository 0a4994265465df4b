use crate::extract::{self, FormatProfile, MediaMetadata};
use crate::server::AppContext;
use crate::state::Job;
use crate::tools;
use crate::worker;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/info", post(info))
        .route("/start_download", post(start_download))
        .route("/progress/:job_id", get(progress))
        .route("/get_file/:filename", get(get_file))
        .route("/tools", get(get_tools))
}

/// Short `{"error": ...}` body, matching what the front-end expects.
type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

#[derive(Deserialize)]
struct InfoRequest {
    url: Option<String>,
}

async fn info(
    State(_ctx): State<AppContext>,
    Json(payload): Json<InfoRequest>,
) -> Result<Json<MediaMetadata>, ApiError> {
    let url = payload.url.unwrap_or_default().trim().to_string();
    if url.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "No URL provided"));
    }

    // Subprocess I/O; keep it off the request path's runtime threads.
    let metadata = tokio::task::spawn_blocking(move || extract::fetch_metadata(&url))
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(metadata))
}

#[derive(Deserialize)]
struct StartDownloadRequest {
    url: Option<String>,
    #[serde(rename = "type")]
    format_type: Option<String>,
}

#[derive(Serialize)]
struct StartDownloadResponse {
    job_id: Uuid,
}

async fn start_download(
    State(ctx): State<AppContext>,
    Json(payload): Json<StartDownloadRequest>,
) -> Result<Json<StartDownloadResponse>, ApiError> {
    let url = payload.url.unwrap_or_default().trim().to_string();
    if url.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "No URL provided"));
    }

    // Both profiles post-process through ffmpeg; fail fast before creating
    // any job record.
    if ctx.ffmpeg.is_none() {
        return Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ffmpeg is not installed on the server. Cannot convert to MP3/MP4.",
        ));
    }

    let profile = FormatProfile::from_type(payload.format_type.as_deref());
    let job = ctx.state.create_job();

    worker::spawn_download(
        ctx.state.clone(),
        ctx.config.clone(),
        ctx.ffmpeg.clone(),
        job.id,
        url.clone(),
        profile,
    );

    tracing::info!("Started {:?} download job {} for {}", profile, job.id, url);

    Ok(Json(StartDownloadResponse { job_id: job.id }))
}

async fn progress(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    // A malformed id was never issued by us, so it's the same not-found.
    let not_found = || error_response(StatusCode::NOT_FOUND, "Job not found");

    let id: Uuid = job_id.parse().map_err(|_| not_found())?;
    ctx.state.get_job(id).map(Json).ok_or_else(not_found)
}

async fn get_file(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || error_response(StatusCode::NOT_FOUND, "File not found");

    // Strip every directory component; only a bare file name may reach the
    // output directory.
    let name = sanitize_filename(&filename).ok_or_else(not_found)?;
    let path = ctx.config.download.output_dir.join(&name);

    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found())?;
    let size = file.metadata().await.map_err(|_| not_found())?.len();

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", name.replace('"', "")),
        )
        .body(body)
        .map_err(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "Response build failed"))
}

async fn get_tools() -> impl IntoResponse {
    #[derive(Serialize)]
    struct ToolStatusResponse {
        name: String,
        available: bool,
        version: Option<String>,
        path: Option<String>,
    }

    let tools = tokio::task::spawn_blocking(tools::check_tools)
        .await
        .unwrap_or_default();
    let response: Vec<ToolStatusResponse> = tools
        .into_iter()
        .map(|t| ToolStatusResponse {
            name: t.name,
            available: t.available,
            version: t.version,
            path: t.path.map(|p| p.display().to_string()),
        })
        .collect();
    Json(response)
}

/// Reduce a requested filename to its base name.
///
/// Any path syntax (`/`, `\`, `..`) is stripped rather than rejected, so
/// `../../etc/passwd` resolves to `passwd` inside the output directory.
fn sanitize_filename(input: &str) -> Option<String> {
    let base = input
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input);

    let name = std::path::Path::new(base).file_name()?.to_str()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("webm") => "video/webm",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}
