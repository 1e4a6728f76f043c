// src/external/mock.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use super::client::{HttpClient, HttpRequest};
use super::error::ExternalCallError;

#[derive(Debug, Clone)]
enum Scripted {
    Body(Value),
    Failure(String),
    Status(u16),
}

/// Mock HTTP client for testing. Responses are scripted per URL.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    responses: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `url` with a decoded JSON body.
    pub fn respond(&self, url: impl Into<String>, body: Value) {
        self.responses.lock().insert(url.into(), Scripted::Body(body));
    }

    /// Fail requests to `url` with a transport error.
    pub fn fail(&self, url: impl Into<String>, message: impl Into<String>) {
        self.responses
            .lock()
            .insert(url.into(), Scripted::Failure(message.into()));
    }

    /// Answer requests to `url` with a non-success status.
    pub fn respond_status(&self, url: impl Into<String>, status: u16) {
        self.responses.lock().insert(url.into(), Scripted::Status(status));
    }

    /// Requests received so far (for assertions).
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<Value, ExternalCallError> {
        self.requests.lock().push(request.clone());

        let scripted = self.responses.lock().get(&request.url).cloned();
        match scripted {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Failure(message)) => {
                Err(ExternalCallError::transport(request.url, message))
            }
            Some(Scripted::Status(status)) => Err(ExternalCallError::Status {
                method: request.method.to_string(),
                url: request.url,
                status,
            }),
            None => Err(ExternalCallError::transport(
                request.url,
                "no response scripted",
            )),
        }
    }
}
