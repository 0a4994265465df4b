//! Tubegrab - web front-end for yt-dlp downloads
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod extract;
pub mod server;
pub mod state;
pub mod tools;
pub mod worker;
