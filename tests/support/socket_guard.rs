//! Skips wiremock-based tests in sandboxes that cannot bind localhost.
//!
//! Set `DOWNLOADER_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_VAR: &str = "DOWNLOADER_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_VAR)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` (after logging why) when the
/// environment forbids binding a localhost socket.
#[track_caller]
pub fn mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    let can_bind = TcpListener::bind("127.0.0.1:0").is_ok();

    async move {
        if can_bind {
            return Some(MockServer::start().await);
        }

        let message = format!(
            "[socket-bound-test] cannot bind localhost at {}:{}",
            caller.file(),
            caller.line()
        );
        assert!(!sockets_required(), "{message}; unset {REQUIRE_VAR} to allow skipping");
        eprintln!("{message}; skipping. Set {REQUIRE_VAR}=1 to fail instead.");
        None
    }
}
