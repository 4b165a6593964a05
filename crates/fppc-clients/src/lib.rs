//! The remote-API seam (spec section 9): a three-method trait implemented
//! once against real OpenAI-compatible endpoints and once as an in-memory
//! mock so no integration test ever dials out.

pub mod client;
pub mod http;
pub mod mock;
pub mod retry;

pub use client::{ClientError, ClientResult, RemoteApiClient, TextResponse};
pub use http::{EndpointConfig, HttpApiClient};
pub use mock::MockApiClient;
pub use retry::{with_retry, RetryPolicy};
