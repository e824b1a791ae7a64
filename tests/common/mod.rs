//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_health() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.health().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

#[allow(dead_code)]
mod client;
mod constants;
#[allow(dead_code)]
mod fixtures;
#[allow(dead_code)]
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{all_tools_server, rpc_request, FakeRestClient};
#[allow(unused_imports)]
pub use server::TestServer;
