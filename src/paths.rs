//! Path validation and idempotent directory creation.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[allow(clippy::expect_used)]
static WINDOWS_INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["*:<>?|]"#).expect("static regex is valid"));

/// Errors from path validation and directory creation.
#[derive(Debug, Error)]
pub enum PathError {
    /// The path contains characters the host filesystem does not accept.
    #[error("path contains invalid characters: {path}")]
    InvalidCharacters {
        /// The rejected path.
        path: PathBuf,
    },

    /// Creating the directory failed.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Rejects paths with filesystem-unsafe characters on the host platform.
///
/// Only Windows has restrictions beyond NUL; the root prefix (`C:\`) is
/// excluded from the check.
///
/// # Errors
///
/// Returns [`PathError::InvalidCharacters`] when the path is unsafe.
pub fn check_path(path: &Path) -> Result<(), PathError> {
    if cfg!(windows) {
        check_windows_path(path)
    } else {
        Ok(())
    }
}

fn check_windows_path(path: &Path) -> Result<(), PathError> {
    let without_root: PathBuf = path
        .components()
        .filter(|component| !matches!(component, Component::Prefix(_) | Component::RootDir))
        .collect();

    if WINDOWS_INVALID_CHARS.is_match(&without_root.to_string_lossy()) {
        return Err(PathError::InvalidCharacters {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Creates `path` and all parents. An existing directory is success, which
/// keeps concurrent callers racing on the same directory safe.
///
/// # Errors
///
/// Returns [`PathError`] if the path is unsafe or creation fails.
pub async fn ensure_dir(path: &Path) -> Result<(), PathError> {
    check_path(path)?;

    match tokio::fs::create_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "directory ready");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(PathError::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}
