//! Templated outbound HTTP calls.

pub mod client;
pub mod error;
pub mod invoker;
pub mod mock;

pub use client::{HttpClient, HttpClientSettings, HttpMethod, HttpRequest, ReqwestHttpClient};
pub use error::ExternalCallError;
pub use invoker::ExternalCallInvoker;
pub use mock::MockHttpClient;
