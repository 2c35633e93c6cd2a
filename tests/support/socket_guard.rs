//! Guard for tests that bind a local wiremock server.
//!
//! Sandboxed runners often forbid binding localhost. Those tests then skip
//! with a note on stderr, unless `HARVESTER_REQUIRE_SOCKET_TESTS` is set, in
//! which case they fail.

#![allow(dead_code)]

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "HARVESTER_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|v| {
        let v = v.trim().to_ascii_lowercase();
        v == "1" || v == "true" || v == "yes"
    })
}

/// Returns false (and reports where) when localhost cannot be bound.
///
/// # Panics
///
/// Panics instead of returning false when sockets are required.
#[track_caller]
fn can_bind_localhost() -> bool {
    if TcpListener::bind(("127.0.0.1", 0)).is_ok() {
        return true;
    }
    let caller = Location::caller();
    assert!(
        !sockets_required(),
        "localhost bind failed for mock server test at {caller} and {REQUIRE_ENV} is set"
    );
    eprintln!("skipping mock server test at {caller}: localhost bind failed");
    false
}

/// Starts a mock server, or returns `None` when the test should skip.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let available = can_bind_localhost();
    async move {
        if available {
            Some(MockServer::start().await)
        } else {
            None
        }
    }
}
