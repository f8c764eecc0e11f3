//! Output filename resolution for downloads.
//!
//! A name is taken from the first signal that yields one:
//!
//! 1. the caller's explicit filename (percent-decoded, spaces replaced),
//! 2. the `Content-Disposition` `filename` parameter,
//! 3. the URL basename, if it already has an extension,
//! 4. the URL basename with its extension replaced by one derived from the media type.
//!
//! The result is always a single safe path segment, truncated to the
//! configured length by keeping its tail so the extension survives.

use std::path::{Component, Path};

use url::Url;

/// Longest extension (without the dot) still treated as an extension.
const MAX_EXTENSION_LEN: usize = 11;

/// Which signal produced the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameSource {
    /// Supplied by the caller.
    Explicit,
    /// `Content-Disposition` response header.
    ContentDisposition,
    /// URL basename that already had an extension.
    UrlPath,
    /// URL basename plus an extension mapped from the media type.
    MediaType,
}

/// Inputs available when naming a downloaded file.
#[derive(Debug, Clone, Copy)]
pub struct FilenameSignals<'a> {
    /// Caller-supplied filename.
    pub explicit: Option<&'a str>,
    /// Raw `Content-Disposition` header value.
    pub content_disposition: Option<&'a str>,
    /// Final URL after redirects.
    pub url: &'a Url,
    /// Media type essence, e.g. `image/png`.
    pub media_type: &'a str,
}

/// A resolved, filesystem-safe filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilename {
    /// The filename, a single path segment.
    pub name: String,
    /// The signal it came from.
    pub source: FilenameSource,
}

/// Resolves the output filename, or `None` when no signal yields one.
#[must_use]
pub fn resolve_filename(signals: &FilenameSignals<'_>, max_len: usize) -> Option<ResolvedFilename> {
    let (raw, source) = pick_candidate(signals)?;
    // Truncate before sanitizing so a cut can never leave a bare `.` or `..`.
    let name = sanitize_filename(&truncate_tail(&raw, max_len));
    Some(ResolvedFilename { name, source })
}

fn pick_candidate(signals: &FilenameSignals<'_>) -> Option<(String, FilenameSource)> {
    if let Some(explicit) = signals.explicit.and_then(normalize_explicit) {
        return Some((explicit, FilenameSource::Explicit));
    }

    if let Some(name) = signals
        .content_disposition
        .and_then(parse_content_disposition)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
    {
        return Some((name, FilenameSource::ContentDisposition));
    }

    let basename = url_basename(signals.url)?;
    let (stem, extension) = split_extension(&basename);
    if extension.is_some() {
        return Some((basename.clone(), FilenameSource::UrlPath));
    }

    let mapped = extension_for_media_type(signals.media_type)?;
    Some((format!("{stem}.{mapped}"), FilenameSource::MediaType))
}

fn normalize_explicit(explicit: &str) -> Option<String> {
    let decoded = urlencoding::decode(explicit)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| explicit.to_string());
    let name = decoded.trim().replace(' ', "_");
    (!name.is_empty()).then_some(name)
}

/// Last non-empty path segment of `url`, percent-decoded.
pub(crate) fn url_basename(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Splits `name` into stem and extension. A leading dot (`.bashrc`) is part
/// of the stem, and an extension must be short and alphanumeric.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => {
            let ext = &name[pos + 1..];
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
            {
                (&name[..pos], Some(ext))
            } else {
                (&name[..pos], None)
            }
        }
        _ => (name, None),
    }
}

/// Media type essence (lowercase, parameters stripped) of a `Content-Type` value.
#[must_use]
pub fn media_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    (!essence.is_empty()).then_some(essence)
}

/// File extension (without dot) for a media type.
///
/// Known types use a fixed table. Otherwise the subtype is used when it is
/// a plain token (`image/bmp` → `bmp`), or its structured suffix
/// (`application/ld+json` → `json`).
#[must_use]
pub fn extension_for_media_type(media_type: &str) -> Option<String> {
    let known = match media_type {
        "text/html" => Some("html"),
        "text/plain" => Some("txt"),
        "text/css" => Some("css"),
        "text/javascript" | "application/javascript" => Some("js"),
        "application/xml" | "text/xml" => Some("xml"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "application/gzip" => Some("gz"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/svg+xml" => Some("svg"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        "video/quicktime" => Some("mov"),
        "audio/mpeg" => Some("mp3"),
        "audio/x-wav" | "audio/wave" => Some("wav"),
        _ => None,
    };
    if let Some(ext) = known {
        return Some(ext.to_string());
    }

    let subtype = media_type.split_once('/')?.1;
    let token = subtype.rsplit_once('+').map_or(subtype, |(_, suffix)| suffix);
    let token = token.strip_prefix("x-").unwrap_or(token);
    let is_plain = !token.is_empty()
        && token.len() <= MAX_EXTENSION_LEN
        && token.chars().all(|c| c.is_ascii_alphanumeric());
    is_plain.then(|| token.to_string())
}

/// Parses a Content-Disposition header to extract the filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987, preferred)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `header`.
    let lower = header.to_ascii_lowercase();

    if let Some(pos) = lower.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = lower.find("filename=")?;
    let value = header[pos + 9..].trim();

    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let quoted = &stripped[..end];
        return (!quoted.is_empty()).then(|| quoted.to_string());
    }

    let end = value.find(';').unwrap_or(value.len());
    let bare = value[..end].trim();
    (!bare.is_empty()).then(|| bare.to_string())
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) and rewrites dot-only
/// names so the result never leaves the output directory.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Keeps the last `max_len` characters of `name` (at least one).
#[must_use]
pub fn truncate_tail(name: &str, max_len: usize) -> String {
    let max_len = max_len.max(1);
    let count = name.chars().count();
    if count <= max_len {
        return name.to_string();
    }
    name.chars().skip(count - max_len).collect()
}
