//! Constants for the download module (timeouts, redirect and filename limits).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default maximum number of redirect hops followed per download.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Default maximum filename length in characters.
pub const DEFAULT_FILENAME_MAX_LENGTH: usize = 80;

/// Upper bound on bytes read when draining a rejected response body.
pub const DRAIN_LIMIT_BYTES: usize = 64 * 1024;

/// Formats accepted by [`ContentPolicy::MediaOnly`](super::ContentPolicy::MediaOnly).
pub const MEDIA_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif", "svg", "mov", "mp4"];
