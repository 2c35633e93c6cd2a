//! Shared helpers for unit tests that need a local mock HTTP server.

#[path = "../../tests/support/socket_guard.rs"]
pub mod socket_guard;
