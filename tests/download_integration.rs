//! Integration tests for the download module.
//!
//! These tests verify the full download flow with mock HTTP servers.

mod support;

use std::time::Duration;

use fetchkit::download::{DownloadError, DownloadOptions, Downloader, RedirectIssue};
use fetchkit::{DownloaderConfig, download};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use support::socket_guard::mock_server_or_skip;
use tempfile::TempDir;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

fn png() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(PNG_BYTES.to_vec(), "image/png")
}

fn redirect(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("Location", location)
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_url_basename_resolves_into_output_dir() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/img.png", png()).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/img.png", server.uri());
    let file_path = download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect("download should succeed");

    assert_eq!(file_path, temp_dir.path().join("img.png"));
    assert!(file_path.is_absolute());
    assert_eq!(std::fs::read(&file_path).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_download_extension_from_content_type() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/media/cover", png()).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/media/cover", server.uri());
    let file_path = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect("download should succeed");

    assert_eq!(file_path.file_name().unwrap(), "cover.png");
}

#[tokio::test]
async fn test_download_uses_content_disposition_filename() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(
        &server,
        "/api/get",
        png().insert_header("Content-Disposition", r#"attachment; filename="poster-final.png""#),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/api/get", server.uri());
    let file_path = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect("download should succeed");

    assert_eq!(file_path.file_name().unwrap(), "poster-final.png");
}

#[tokio::test]
async fn test_download_explicit_filename_is_tail_truncated() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/img.png", png()).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let long_name = format!("{}.png", "a".repeat(90) + &"b".repeat(6));
    assert_eq!(long_name.chars().count(), 100);
    let options = DownloadOptions::default()
        .with_filename(long_name.clone())
        .with_filename_max_length(20);

    let url = format!("{}/img.png", server.uri());
    let file_path = Downloader::new()
        .download(&url, temp_dir.path(), &options)
        .await
        .expect("download should succeed");

    let name = file_path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name, &long_name[80..]);
    assert_eq!(name, "aaaaaaaaaabbbbbb.png");
}

#[tokio::test]
async fn test_download_follows_redirect_chain() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    let final_url = format!("{}/files/final.png", server.uri());
    mount(&server, "/start", redirect(302, "/middle")).await;
    mount(&server, "/middle", redirect(301, &final_url)).await;
    mount(&server, "/files/final.png", png()).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/start", server.uri());
    let file_path = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect("redirect chain should resolve");

    assert_eq!(file_path.file_name().unwrap(), "final.png");
    assert_eq!(std::fs::read(&file_path).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_download_self_redirect_fails() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/loop", redirect(302, "/loop")).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/loop", server.uri());
    let result = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Redirect {
            issue: RedirectIssue::SelfReferential,
            ..
        })
    ));
}

#[tokio::test]
async fn test_download_redirect_cycle_fails() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/a", redirect(302, "/b")).await;
    mount(&server, "/b", redirect(302, "/a")).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/a", server.uri());
    let result = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::Redirect {
            issue: RedirectIssue::Loop(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_download_redirect_without_location_fails() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/moved", ResponseTemplate::new(302)).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/moved", server.uri());
    let error = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect_err("302 without Location must fail");

    assert!(matches!(
        error,
        DownloadError::Redirect {
            issue: RedirectIssue::MissingLocation,
            ..
        }
    ));
    assert!(error.to_string().contains("invalid redirect"), "got: {error}");
    assert!(error.to_string().contains(&url), "got: {error}");
}

#[tokio::test]
async fn test_download_redirect_hop_limit() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/r0", redirect(302, "/r1")).await;
    mount(&server, "/r1", redirect(302, "/r2")).await;
    mount(&server, "/r2", redirect(302, "/r3.png")).await;
    mount(&server, "/r3.png", png()).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let config = DownloaderConfig {
        max_redirects: 2,
        ..DownloaderConfig::default()
    };
    let downloader = Downloader::with_config(config).expect("client should build");
    let options = DownloadOptions::default();

    let within_limit = downloader
        .download(&format!("{}/r1", server.uri()), temp_dir.path(), &options)
        .await;
    assert!(within_limit.is_ok(), "two hops should succeed: {within_limit:?}");

    let over_limit = downloader
        .download(&format!("{}/r0", server.uri()), temp_dir.path(), &options)
        .await;
    assert!(matches!(
        over_limit,
        Err(DownloadError::Redirect {
            issue: RedirectIssue::TooManyHops(2),
            ..
        })
    ));
}

#[tokio::test]
async fn test_download_404_returns_status_error() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/missing.png", ResponseTemplate::new(404)).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/missing.png", server.uri());
    let result = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await;

    match result {
        Err(DownloadError::Status {
            status, message, ..
        }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(!temp_dir.path().join("missing.png").exists());
}

#[tokio::test]
async fn test_download_missing_content_type_fails() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(
        &server,
        "/blob",
        ResponseTemplate::new(200).set_body_bytes(b"opaque".to_vec()),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/blob", server.uri());
    let result = Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::ContentType {
            content_type: None,
            ..
        })
    ));
}

#[tokio::test]
async fn test_download_media_only_rejects_html() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(
        &server,
        "/page",
        ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html; charset=utf-8"),
    )
    .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/page", server.uri());
    let downloader = Downloader::new();

    let rejected = downloader
        .download(&url, temp_dir.path(), &DownloadOptions::default().media_only())
        .await;
    match rejected {
        Err(DownloadError::ContentType { content_type, .. }) => {
            assert_eq!(content_type.as_deref(), Some("text/html"));
        }
        other => panic!("expected content type error, got {other:?}"),
    }

    let accepted = downloader
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect("any policy accepts html");
    assert_eq!(accepted.file_name().unwrap(), "page.html");
}

#[tokio::test]
async fn test_download_creates_missing_output_directory() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/img.png", png()).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let output_dir = temp_dir.path().join("nested").join("media");
    assert!(!output_dir.exists());

    let url = format!("{}/img.png", server.uri());
    let file_path = Downloader::new()
        .download(&url, &output_dir, &DownloadOptions::default())
        .await
        .expect("download should create the directory");

    assert!(output_dir.is_dir());
    assert_eq!(file_path, output_dir.join("img.png"));
    assert_eq!(std::fs::read(&file_path).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_download_timeout_returns_timeout_error() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/slow.png", png().set_delay(Duration::from_millis(500))).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/slow.png", server.uri());
    let options = DownloadOptions::default().with_timeout(Duration::from_millis(100));
    let result = Downloader::new()
        .download(&url, temp_dir.path(), &options)
        .await;

    let error = result.expect_err("slow response should time out");
    assert!(matches!(error, DownloadError::Timeout { .. }), "got {error:?}");
    assert!(error.is_transient());
    assert!(!temp_dir.path().join("slow.png").exists());
}

#[tokio::test]
async fn test_download_sends_default_user_agent() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/ua.png"))
        .and(header_exists("user-agent"))
        .respond_with(png())
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let url = format!("{}/ua.png", server.uri());
    Downloader::new()
        .download(&url, temp_dir.path(), &DownloadOptions::default())
        .await
        .expect("download should succeed");
}

#[tokio::test]
async fn test_download_caller_headers_override_user_agent() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/custom.png"))
        .and(header("user-agent", "custom-agent/1.0"))
        .respond_with(png())
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("custom-agent/1.0"));
    let options = DownloadOptions::default().with_headers(headers);

    let url = format!("{}/custom.png", server.uri());
    let file_path = Downloader::new()
        .download(&url, temp_dir.path(), &options)
        .await
        .expect("download should succeed");
    assert_eq!(file_path.file_name().unwrap(), "custom.png");
}

#[tokio::test]
async fn test_download_into_regular_file_fails_without_retry() {
    let Some(server) = mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(png())
        .expect(1)
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let not_a_dir = temp_dir.path().join("occupied");
    std::fs::write(&not_a_dir, b"already a file").unwrap();

    let url = format!("{}/img.png", server.uri());
    let result = Downloader::new()
        .download(&url, &not_a_dir, &DownloadOptions::default())
        .await;

    match result {
        Err(error @ DownloadError::Filesystem { .. }) => {
            assert!(!error.is_missing_directory(), "got {error:?}");
        }
        other => panic!("expected filesystem error, got {other:?}"),
    }
    assert!(not_a_dir.is_file());
}
