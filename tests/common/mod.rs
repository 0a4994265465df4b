//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds a full [`AppContext`] around a
//! temporary output directory and starts Axum on a random port for
//! HTTP-level testing. The ffmpeg precondition is injected so tests behave
//! the same on hosts with and without the real binary.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tubegrab::config::Config;
use tubegrab::server::{create_router, AppContext};
use tubegrab::state::AppState;

pub struct TestHarness {
    pub ctx: AppContext,
    output_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Harness with ffmpeg "available" (path injected, never executed by the
    /// routes under test).
    pub fn new() -> Self {
        Self::with_ffmpeg(Some(PathBuf::from("/usr/bin/ffmpeg")))
    }

    /// Harness where the transcoding binary is missing.
    pub fn without_ffmpeg() -> Self {
        Self::with_ffmpeg(None)
    }

    fn with_ffmpeg(ffmpeg: Option<PathBuf>) -> Self {
        let output_dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.download.output_dir = output_dir.path().to_path_buf();
        config.server.static_dir = None;

        let ctx = AppContext {
            state: AppState::new(),
            config: Arc::new(config),
            ffmpeg,
        };

        Self { ctx, output_dir }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Start a server whose context reports ffmpeg as unavailable.
    pub async fn with_server_no_ffmpeg() -> (Self, SocketAddr) {
        Self::without_ffmpeg().serve().await
    }

    async fn serve(self) -> (Self, SocketAddr) {
        let app = create_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Drop a fake artifact into the output directory.
    pub fn seed_artifact(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.output_dir.path().join(name);
        std::fs::write(&path, bytes).expect("failed to seed artifact");
        path
    }

    /// Write a file OUTSIDE the output directory (for traversal tests).
    pub fn seed_outside_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self
            .output_dir
            .path()
            .parent()
            .expect("temp dir has no parent")
            .join(name);
        std::fs::write(&path, bytes).expect("failed to write outside file");
        path
    }
}
