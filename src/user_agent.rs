//! Default User-Agent strings for download requests.
//!
//! Many media hosts reject non-browser agents, so the default mimics a desktop
//! browser on the host platform.

const CHROME_SUFFIX: &str = "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

/// Browser-like User-Agent for the current platform.
#[must_use]
pub fn default_user_agent() -> String {
    user_agent_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Browser-like User-Agent for an explicit `os`/`arch` pair.
#[must_use]
pub fn user_agent_for(os: &str, arch: &str) -> String {
    match os {
        "macos" => format!("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) {CHROME_SUFFIX}"),
        "linux" => format!("Mozilla/5.0 (X11; Linux {arch}) {CHROME_SUFFIX}"),
        "windows" => format!("Mozilla/5.0 (Windows NT 10.0; Win64; x64) {CHROME_SUFFIX}"),
        other => {
            let version = env!("CARGO_PKG_VERSION");
            format!("Mozilla/5.0 (compatible; fetchkit/{version}; {other} {arch})")
        }
    }
}
