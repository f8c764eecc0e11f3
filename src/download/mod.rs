//! HTTP download of a single resource into a directory.
//!
//! This module fetches one URL, follows redirects itself, checks the terminal
//! response, works out a safe filename and streams the body to disk.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Manual redirect following with a hop limit and loop detection
//! - Filename from explicit option, Content-Disposition, URL path or content type
//! - Tail-preserving filename truncation (the extension survives)
//! - Missing output directories are created on demand
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use fetchkit::download::{DownloadOptions, download};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = DownloadOptions::default().media_only();
//! let file_path = download("https://example.com/cover", Path::new("./media"), &options).await?;
//! println!("Downloaded: {}", file_path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod filename;

pub use client::{ContentPolicy, DownloadOptions, Downloader, download};
pub use error::{DownloadError, RedirectIssue};
pub use filename::{FilenameSource, ResolvedFilename};
