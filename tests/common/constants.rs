//! Shared constants for end-to-end tests

/// Maximum time to wait for a spawned server to answer `/health`
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Delay between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Per-request timeout for the test HTTP client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
