use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use super::error::ExternalCallError;

/// Methods an external call may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Case-insensitive parse; unsupported methods yield `None`.
    pub fn parse(method: &str) -> Option<Self> {
        if method.eq_ignore_ascii_case("GET") {
            Some(HttpMethod::Get)
        } else if method.eq_ignore_ascii_case("POST") {
            Some(HttpMethod::Post)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header pairs sorted by name
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Transport used for external calls.
///
/// Implementations decode the response body as JSON; an empty body is null.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<Value, ExternalCallError>;
}

/// Timeouts and TLS settings for the outbound client.
#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Accept any server certificate. Development only.
    pub trust_all_certificates: bool,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            trust_all_certificates: false,
        }
    }
}

/// `reqwest`-backed client.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(settings: &HttpClientSettings) -> Result<Self, ExternalCallError> {
        if settings.trust_all_certificates {
            warn!("TLS certificate verification is disabled for external calls");
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.trust_all_certificates)
            .build()
            .map_err(|e| ExternalCallError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<Value, ExternalCallError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExternalCallError::transport(&request.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalCallError::Status {
                method: request.method.to_string(),
                url: request.url,
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExternalCallError::transport(&request.url, e))?;

        decode_body(&request.url, &text)
    }
}

/// Decode a response body. Blank bodies decode to null.
pub fn decode_body(url: &str, text: &str) -> Result<Value, ExternalCallError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(text).map_err(|e| ExternalCallError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
