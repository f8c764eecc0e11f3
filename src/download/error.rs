//! Error types for the download module.
//!
//! Every way a single transfer can fail maps to one variant, so callers
//! (and the retry wrapper) can match on the failure kind.

use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::paths::PathError;
use crate::retry::Aborted;

/// Why a redirect response could not be followed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectIssue {
    /// 301/302 without a `Location` header.
    #[error("missing Location header")]
    MissingLocation,

    /// `Location` could not be parsed as a URL.
    #[error("unparsable Location {0:?}")]
    InvalidLocation(String),

    /// `Location` points back at the URL that was just requested.
    #[error("Location points to itself")]
    SelfReferential,

    /// `Location` revisits a URL already seen in this chain.
    #[error("redirect loop back to {0}")]
    Loop(String),

    /// The chain is longer than the configured hop limit.
    #[error("more than {0} redirects")]
    TooManyHops(usize),
}

/// Errors that can occur during a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS, broken body stream).
    #[error("transport error downloading {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The request (including body) did not finish within the timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// A redirect response was broken or formed a loop.
    #[error("request at {url} has invalid redirect: {issue}")]
    Redirect {
        /// The URL whose response carried the redirect.
        url: String,
        /// What was wrong with it.
        issue: RedirectIssue,
    },

    /// Terminal response with a status other than 200.
    #[error("HTTP {status} {message} downloading {url}")]
    Status {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Canonical reason phrase (may be empty).
        message: String,
    },

    /// The response has no usable content type.
    #[error("{}", content_type_message(.url, .content_type.as_deref()))]
    ContentType {
        /// The URL that was downloaded.
        url: String,
        /// The rejected content type, `None` when the header was missing.
        content_type: Option<String>,
    },

    /// No filename could be derived from the options, headers or URL.
    #[error("cannot derive a filename for {url}; pass an explicit filename")]
    FilenameResolution {
        /// The URL that was downloaded.
        url: String,
    },

    /// File system error while writing the download.
    #[error("IO error writing to {path}: {source}")]
    Filesystem {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL is malformed or does not use http/https.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The output directory failed path validation or could not be created.
    #[error(transparent)]
    Path(#[from] PathError),

    /// The downloader configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A retry loop wrapping the download was cancelled.
    #[error(transparent)]
    Aborted(#[from] Aborted),
}

fn content_type_message(url: &str, content_type: Option<&str>) -> String {
    match content_type {
        None => format!("response from {url} has no content type"),
        Some(ct) => format!("response from {url} has disallowed content type {ct:?}"),
    }
}

impl DownloadError {
    /// Creates a transport error, promoting reqwest timeouts to [`Self::Timeout`].
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Transport {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a redirect error.
    pub fn redirect(url: impl Into<String>, issue: RedirectIssue) -> Self {
        Self::Redirect {
            url: url.into(),
            issue,
        }
    }

    /// Creates a status error.
    pub fn status(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a content-type error.
    pub fn content_type(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::ContentType {
            url: url.into(),
            content_type,
        }
    }

    /// Creates a filename-resolution error.
    pub fn filename_resolution(url: impl Into<String>) -> Self {
        Self::FilenameResolution { url: url.into() }
    }

    /// Creates a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// True when the write failed because the destination directory is missing.
    #[must_use]
    pub fn is_missing_directory(&self) -> bool {
        matches!(self, Self::Filesystem { source, .. } if source.kind() == ErrorKind::NotFound)
    }

    /// True for failures a later attempt may not hit again.
    ///
    /// | Failure | Transient |
    /// |---------|-----------|
    /// | Transport, Timeout | yes |
    /// | Status 408, 429, 5xx | yes |
    /// | everything else | no |
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            _ => false,
        }
    }
}
