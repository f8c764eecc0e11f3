//! Media file helpers: extension checks and public URLs for saved files.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Path segment under which downloaded media is served.
pub const STATIC_SEGMENT: &str = "/static/";

#[allow(clippy::expect_used)]
static IMAGE_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|webp|avif|gif|svg)$").expect("image regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static VIDEO_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp4|mov)$").expect("video regex is valid") // Static pattern, safe to panic
});

/// Errors from media path helpers.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The path is not under a `/static/` directory.
    #[error("path {path} has no /static/ segment")]
    NotStatic {
        /// The offending path.
        path: String,
    },
}

/// Broad category of a file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Unknown,
}

/// True if `name` ends in an image extension (case-insensitive).
#[must_use]
pub fn is_image(name: &str) -> bool {
    IMAGE_EXT.is_match(name)
}

/// True if `name` ends in a video extension (case-insensitive).
#[must_use]
pub fn is_video(name: &str) -> bool {
    VIDEO_EXT.is_match(name)
}

/// True if `name` is an image or a video, per [`is_image`] and [`is_video`].
#[must_use]
pub fn is_media(name: &str) -> bool {
    is_image(name) || is_video(name)
}

/// Classifies a file by extension.
///
/// Unlike [`is_image`]/[`is_video`], this recognises a few container
/// formats (`avi`, `mkv`, `wmv`) that are not accepted for download.
#[must_use]
pub fn file_kind(name: &str) -> FileKind {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" => FileKind::Image,
        "mp4" | "avi" | "mkv" | "wmv" => FileKind::Video,
        _ => FileKind::Unknown,
    }
}

/// Translates a saved file path into its public URL.
///
/// Everything after the first `/static/` segment is appended to
/// `{server_url}/static/`. Query pairs are percent-encoded.
///
/// # Errors
///
/// Returns [`MediaError::NotStatic`] if `path` has no `/static/` segment.
pub fn url_from_path(
    server_url: &str,
    path: &str,
    query: &[(&str, &str)],
) -> Result<String, MediaError> {
    let normalized = path.replace('\\', "/");
    let Some((_, rest)) = normalized.split_once(STATIC_SEGMENT) else {
        return Err(MediaError::NotStatic {
            path: path.to_string(),
        });
    };

    let mut url = format!("{}{STATIC_SEGMENT}{rest}", server_url.trim_end_matches('/'));
    if !query.is_empty() {
        let pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        url.push('?');
        url.push_str(&pairs.join("&"));
    }
    Ok(url)
}
