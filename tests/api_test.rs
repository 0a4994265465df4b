//! API integration tests.
//!
//! Runs the real Axum server on a random port (see [`common::TestHarness`])
//! and exercises the HTTP contract with `reqwest`. Nothing here shells out
//! to ffmpeg; the tool precondition is injected by the harness.

mod common;

use common::TestHarness;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_200() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 200);
}

// ---------------------------------------------------------------------------
// Metadata endpoint validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn info_requires_url() {
    let (_harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({}),
        serde_json::json!({"url": ""}),
        serde_json::json!({"url": "   "}),
    ] {
        let resp = client
            .post(format!("http://{addr}/api/info"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "No URL provided");
    }
}

// ---------------------------------------------------------------------------
// Job orchestration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_download_requires_url() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/start_download"))
        .json(&serde_json::json!({"type": "audio"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Validation failures never leave a job behind.
    assert_eq!(harness.ctx.state.job_count(), 0);
}

#[tokio::test]
async fn start_download_rejected_without_ffmpeg() {
    let (harness, addr) = TestHarness::with_server_no_ffmpeg().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/start_download"))
        .json(&serde_json::json!({"url": "https://example.com/v", "type": "audio"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("ffmpeg"));
    assert_eq!(harness.ctx.state.job_count(), 0);
}

#[tokio::test]
async fn start_download_returns_job_id_immediately() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/start_download"))
        .json(&serde_json::json!({"url": "http://127.0.0.1:1/nothing-here"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    let job_id = json["job_id"].as_str().unwrap();
    let id: uuid::Uuid = job_id.parse().unwrap();

    // The job exists right away; the worker runs behind our back.
    assert!(harness.ctx.state.get_job(id).is_some());
}

#[tokio::test]
async fn failed_download_ends_in_terminal_error() {
    let (_harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    // Unroutable URL: whether yt-dlp is installed on this host or not, the
    // pipeline must fail and that failure must surface via polling only.
    let resp = client
        .post(format!("http://{addr}/api/start_download"))
        .json(&serde_json::json!({"url": "http://127.0.0.1:1/unreachable", "type": "audio"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    let job_id = json["job_id"].as_str().unwrap().to_string();

    let deadline = std::time::Instant::now() + Duration::from_secs(120);
    loop {
        let resp = client
            .get(format!("http://{addr}/api/progress/{job_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let job: serde_json::Value = resp.json().await.unwrap();

        let percent = job["percent"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&percent));

        match job["status"].as_str().unwrap() {
            "processing" => {
                assert!(std::time::Instant::now() < deadline, "job never failed");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            "error" => {
                assert!(job["error"].as_str().is_some());
                assert!(job["filename"].is_null());
                break;
            }
            other => panic!("unexpected terminal status: {other}"),
        }
    }
}

#[tokio::test]
async fn concurrent_jobs_are_independent() {
    let (harness, addr) = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for n in 0..2 {
        let resp = client
            .post(format!("http://{addr}/api/start_download"))
            .json(&serde_json::json!({"url": format!("http://127.0.0.1:1/{n}")}))
            .send()
            .await
            .unwrap();
        let json: serde_json::Value = resp.json().await.unwrap();
        ids.push(json["job_id"].as_str().unwrap().to_string());
    }

    assert_ne!(ids[0], ids[1]);
    assert_eq!(harness.ctx.state.job_count(), 2);

    for id in &ids {
        let resp = client
            .get(format!("http://{addr}/api/progress/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}

// ---------------------------------------------------------------------------
// Progress query
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_unknown_job_returns_404() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!(
        "http://{addr}/api/progress/00000000-0000-0000-0000-000000000000"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Job not found");
}

#[tokio::test]
async fn progress_malformed_id_returns_404() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/api/progress/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn progress_reflects_registry_state() {
    let (harness, addr) = TestHarness::with_server().await;

    let job = harness.ctx.state.create_job();
    harness.ctx.state.update_percent(job.id, 37.5);

    let resp = reqwest::get(format!("http://{addr}/api/progress/{}", job.id))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "processing");
    assert_eq!(json["percent"], 37.5);

    harness
        .ctx
        .state
        .finish_job(job.id, "Song.mp3".to_string());

    let resp = reqwest::get(format!("http://{addr}/api/progress/{}", job.id))
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "finished");
    assert_eq!(json["percent"], 100.0);
    assert_eq!(json["filename"], "Song.mp3");
    assert!(json["error"].is_null());
}

// ---------------------------------------------------------------------------
// File retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_file_streams_artifact_as_attachment() {
    let (harness, addr) = TestHarness::with_server().await;
    harness.seed_artifact("My Song.mp3", b"ID3fakeaudio");

    let resp = reqwest::get(format!("http://{addr}/api/get_file/My%20Song.mp3"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "audio/mpeg"
    );
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], b"ID3fakeaudio");
}

#[tokio::test]
async fn get_file_missing_returns_404() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/api/get_file/nope.mp3"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "File not found");
}

#[tokio::test]
async fn get_file_strips_directory_components() {
    let (harness, addr) = TestHarness::with_server().await;

    // A file sitting right outside the output directory must be unreachable.
    let outside = harness.seed_outside_file("outside-secret.txt", b"secret");

    let resp = reqwest::get(format!(
        "http://{addr}/api/get_file/..%2Foutside-secret.txt"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);

    std::fs::remove_file(outside).ok();

    // Traversal resolves against the base name inside the output directory:
    // with a seeded "passwd" the request succeeds and returns OUR file.
    harness.seed_artifact("passwd", b"inside the sandbox");
    let resp = reqwest::get(format!(
        "http://{addr}/api/get_file/..%2F..%2Fetc%2Fpasswd"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(&resp.bytes().await.unwrap()[..], b"inside the sandbox");
}

// ---------------------------------------------------------------------------
// Tooling report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tools_endpoint_reports_both_binaries() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/api/tools"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["yt-dlp", "ffmpeg"]);
}
