//! HTTP downloader that streams a single resource to disk.
//!
//! This module provides the [`Downloader`] struct, which follows redirects
//! itself (so every hop is checked and counted), validates the terminal
//! response, resolves a filename, and streams the body to the output
//! directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Client, Response, StatusCode, redirect};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, trace};
use url::Url;

use super::constants::{DRAIN_LIMIT_BYTES, MEDIA_FORMATS};
use super::error::{DownloadError, RedirectIssue};
use super::filename::{FilenameSignals, extension_for_media_type, media_type, resolve_filename};
use crate::config::DownloaderConfig;
use crate::paths::{check_path, ensure_dir};
use crate::user_agent;

/// Which content types a download accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentPolicy {
    /// Any response with a `Content-Type` header.
    #[default]
    Any,
    /// Only image/video formats (`jpg jpeg png webp avif gif svg mov mp4`).
    MediaOnly,
}

/// Per-call download options.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Explicit output filename; skips header/URL resolution.
    pub filename: Option<String>,
    /// Maximum filename length; defaults to the downloader config.
    pub filename_max_length: Option<usize>,
    /// Whole-request timeout; defaults to the downloader config.
    pub timeout: Option<Duration>,
    /// Extra request headers. These override the default User-Agent.
    pub headers: HeaderMap,
    /// Accepted content types.
    pub content_policy: ContentPolicy,
}

impl DownloadOptions {
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_filename_max_length(mut self, max_length: usize) -> Self {
        self.filename_max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn media_only(mut self) -> Self {
        self.content_policy = ContentPolicy::MediaOnly;
        self
    }
}

/// HTTP(S) downloader for single-file transfers.
///
/// Create once and reuse; the inner client pools connections and the
/// downloader is cheap to clone and share across tasks.
///
/// # Example
///
/// ```no_run
/// use fetchkit::download::{DownloadOptions, Downloader};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = Downloader::new();
/// let path = downloader
///     .download("https://example.com/img.png", Path::new("./media"), &DownloadOptions::default())
///     .await?;
/// println!("Downloaded to: {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    config: DownloaderConfig,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    /// Creates a downloader with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_config(DownloaderConfig::default())
            .expect("failed to build HTTP client with default configuration")
    }

    /// Creates a downloader from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Config`] if the configuration fails
    /// [`DownloaderConfig::validate`], or [`DownloadError::Client`] if the
    /// HTTP client cannot be built.
    pub fn with_config(config: DownloaderConfig) -> Result<Self, DownloadError> {
        config.validate()?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(user_agent::default_user_agent);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .redirect(redirect::Policy::none())
            .gzip(true)
            .user_agent(user_agent)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Downloads `url` into `output_dir` and returns the absolute file path.
    ///
    /// Redirects (301/302) are followed up to the configured hop limit. If the
    /// output directory is missing, it is created and the download is retried
    /// once.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] describing the first failure: invalid URL,
    /// transport or timeout, broken redirect, non-200 status, missing or
    /// disallowed content type, unresolvable filename, or a filesystem error.
    #[instrument(skip(self, output_dir, options), fields(dir = %output_dir.display()))]
    pub async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<PathBuf, DownloadError> {
        check_path(output_dir)?;
        let start = parse_http_url(url)?;

        with_dir_recovery(output_dir, || self.fetch(&start, output_dir, options)).await
    }

    /// One full attempt: follow redirects, validate, and save.
    async fn fetch(
        &self,
        start: &Url,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<PathBuf, DownloadError> {
        let max_redirects = self.config.max_redirects;
        let mut current = start.clone();
        let mut visited = HashSet::from([current.to_string()]);
        let mut hops = 0usize;

        loop {
            let response = self.send(&current, options).await?;
            let status = response.status();

            if matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) {
                let next = match redirect_target(&current, &response, &visited) {
                    Ok(next) => next,
                    Err(issue) => {
                        drain(response).await;
                        return Err(DownloadError::redirect(current.as_str(), issue));
                    }
                };
                if hops >= max_redirects {
                    drain(response).await;
                    return Err(DownloadError::redirect(
                        current.as_str(),
                        RedirectIssue::TooManyHops(max_redirects),
                    ));
                }
                drain(response).await;
                hops += 1;

                if self.config.environment.diagnostics_enabled() {
                    info!(from = %current, to = %next, hop = hops, "request was redirected");
                } else {
                    debug!(from = %current, to = %next, hop = hops, "request was redirected");
                }

                visited.insert(next.to_string());
                current = next;
                continue;
            }

            if status != StatusCode::OK {
                let message = status.canonical_reason().unwrap_or_default();
                drain(response).await;
                return Err(DownloadError::status(current.as_str(), status.as_u16(), message));
            }

            return self.save(response, &current, output_dir, options).await;
        }
    }

    async fn send(&self, url: &Url, options: &DownloadOptions) -> Result<Response, DownloadError> {
        let timeout = options.timeout.unwrap_or_else(|| self.config.read_timeout());
        self.client
            .get(url.clone())
            .headers(options.headers.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DownloadError::transport(url.as_str(), e))
    }

    /// Validates the terminal response and streams it to disk.
    async fn save(
        &self,
        response: Response,
        url: &Url,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> Result<PathBuf, DownloadError> {
        let raw_content_type = header_str(&response, CONTENT_TYPE);
        let Some(media) = raw_content_type.as_deref().and_then(media_type) else {
            drain(response).await;
            return Err(DownloadError::content_type(url.as_str(), raw_content_type));
        };

        if options.content_policy == ContentPolicy::MediaOnly && !is_media_format(&media) {
            drain(response).await;
            return Err(DownloadError::content_type(url.as_str(), Some(media)));
        }

        let content_disposition = header_str(&response, CONTENT_DISPOSITION);
        let signals = FilenameSignals {
            explicit: options.filename.as_deref(),
            content_disposition: content_disposition.as_deref(),
            url,
            media_type: &media,
        };
        let max_len = options
            .filename_max_length
            .unwrap_or(self.config.filename_max_length);
        let Some(resolved) = resolve_filename(&signals, max_len) else {
            drain(response).await;
            return Err(DownloadError::filename_resolution(url.as_str()));
        };
        debug!(filename = %resolved.name, source = ?resolved.source, "resolved filename");

        let file_path = absolute(&output_dir.join(&resolved.name))?;
        let file = File::create(&file_path)
            .await
            .map_err(|e| DownloadError::filesystem(file_path.clone(), e))?;

        let stream_result = stream_to_file(file, response, url, &file_path).await;
        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %file_path.display(), "cleaning up partial file after error");
                if let Err(cleanup) = tokio::fs::remove_file(&file_path).await {
                    trace!(error = %cleanup, "partial file cleanup failed");
                }
                return Err(e);
            }
        };

        info!(path = %file_path.display(), bytes = bytes_written, "download complete");
        Ok(file_path)
    }
}

/// Downloads `url` into `output_dir` with a default-configured [`Downloader`].
///
/// # Errors
///
/// See [`Downloader::download`].
pub async fn download(
    url: &str,
    output_dir: &Path,
    options: &DownloadOptions,
) -> Result<PathBuf, DownloadError> {
    Downloader::with_config(DownloaderConfig::default())?
        .download(url, output_dir, options)
        .await
}

/// Runs `attempt`, and if it fails because `output_dir` is missing, creates
/// the directory and runs it exactly once more.
async fn with_dir_recovery<F, Fut>(output_dir: &Path, mut attempt: F) -> Result<PathBuf, DownloadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PathBuf, DownloadError>>,
{
    let mut created_dir = false;
    loop {
        match attempt().await {
            Err(e) if e.is_missing_directory() && !created_dir => {
                debug!(dir = %output_dir.display(), "output directory missing, creating it");
                ensure_dir(output_dir).await?;
                created_dir = true;
            }
            other => return other,
        }
    }
}

fn parse_http_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(DownloadError::invalid_url(url)),
    }
}

/// Resolves the next hop from a redirect response.
fn redirect_target(
    current: &Url,
    response: &Response,
    visited: &HashSet<String>,
) -> Result<Url, RedirectIssue> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(RedirectIssue::MissingLocation)?;

    let next = current
        .join(location)
        .map_err(|_| RedirectIssue::InvalidLocation(location.to_string()))?;
    if !matches!(next.scheme(), "http" | "https") {
        return Err(RedirectIssue::InvalidLocation(location.to_string()));
    }
    if next == *current {
        return Err(RedirectIssue::SelfReferential);
    }
    if visited.contains(next.as_str()) {
        return Err(RedirectIssue::Loop(next.to_string()));
    }
    Ok(next)
}

fn header_str(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn is_media_format(media: &str) -> bool {
    extension_for_media_type(media).is_some_and(|ext| MEDIA_FORMATS.contains(&ext.as_str()))
}

fn absolute(path: &Path) -> Result<PathBuf, DownloadError> {
    std::path::absolute(path).map_err(|e| DownloadError::filesystem(path.to_path_buf(), e))
}

/// Reads and discards a bounded amount of a rejected response body so the
/// connection can be reused.
async fn drain(response: Response) {
    let mut stream = response.bytes_stream();
    let mut drained = 0usize;
    while drained < DRAIN_LIMIT_BYTES {
        match stream.next().await {
            Some(Ok(chunk)) => drained += chunk.len(),
            Some(Err(e)) => {
                trace!(error = %e, "error while draining response body");
                break;
            }
            None => break,
        }
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: Response,
    url: &Url,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::transport(url.as_str(), e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::filesystem(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::filesystem(file_path.to_path_buf(), e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::filesystem(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
