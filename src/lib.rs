//! Fetchkit Library
//!
//! Resilient single-file HTTP(S) downloads: fetch a URL, follow redirects,
//! pick a safe filename and stream the body to disk. A generic retry wrapper
//! makes any async operation (a download included) retry with fixed or
//! exponential backoff.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - HTTP download with redirect following and filename resolution
//! - [`retry`] - Retry/backoff wrapper with cancellation
//! - [`config`] - Downloader configuration (JSON and environment overrides)
//! - [`environment`] - Development/production detection
//! - [`logging`] - `tracing` subscriber setup
//! - [`media`] - Media extension checks and public URL helpers
//! - [`paths`] - Path validation and directory creation
//! - [`user_agent`] - Platform-specific User-Agent strings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod environment;
pub mod logging;
pub mod media;
pub mod paths;
pub mod retry;
pub mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, DownloaderConfig};
pub use download::{
    ContentPolicy, DownloadError, DownloadOptions, Downloader, RedirectIssue, download,
};
pub use environment::Environment;
pub use paths::PathError;
pub use retry::{Aborted, Backoff, RetryOptions, back_off, with_retry};
