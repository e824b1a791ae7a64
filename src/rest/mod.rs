//! REST backends
//!
//! Tools that talk to an HTTP API instead of a CLI binary go through
//! [`RestClient`], resolved from the tool context just like the shell
//! executor.

pub mod client;

#[cfg(any(test, feature = "mock"))]
pub use client::MockRestClient;
pub use client::{HttpRestClient, RestClient, RestError, RestRequest};
