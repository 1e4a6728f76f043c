use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::ExternalCall;
use crate::expression::{ExpressionEvaluator, Scope};

use super::client::{HttpClient, HttpMethod, HttpRequest};
use super::error::ExternalCallError;

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

/// Renders external call templates and performs the call.
pub struct ExternalCallInvoker {
    client: Arc<dyn HttpClient>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ExternalCallInvoker {
    pub fn new(client: Arc<dyn HttpClient>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { client, evaluator }
    }

    /// Render the call against `scope`.
    ///
    /// Returns `Ok(None)` for methods other than GET and POST.
    pub fn render(
        &self,
        call: &ExternalCall,
        scope: &mut dyn Scope,
    ) -> Result<Option<HttpRequest>, ExternalCallError> {
        let Some(method) = HttpMethod::parse(call.method.trim()) else {
            warn!(method = %call.method, url = %call.url, "Unsupported external call method, skipping");
            return Ok(None);
        };

        let url = self.evaluator.process_template(&call.url, scope)?;

        let mut headers = Vec::with_capacity(call.headers.len() + 1);
        for (name, template) in &call.headers {
            let value = self.evaluator.process_template(template, scope)?;
            headers.push((name.clone(), value));
        }

        let body = match method {
            HttpMethod::Get => None,
            HttpMethod::Post => {
                if !headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE))
                {
                    headers.push((CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()));
                }
                match call.body_template.as_deref() {
                    Some(template) => Some(self.evaluator.process_template(template, scope)?),
                    None => None,
                }
            }
        };

        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Some(HttpRequest {
            method,
            url,
            headers,
            body,
        }))
    }

    /// Render and send the call, returning the decoded response body.
    pub async fn invoke<S>(
        &self,
        call: &ExternalCall,
        scope: &mut S,
    ) -> Result<Option<Value>, ExternalCallError>
    where
        S: Scope + Send,
    {
        let Some(request) = self.render(call, scope)? else {
            return Ok(None);
        };

        debug!(method = %request.method, url = %request.url, "Sending external call");
        self.client.send(request).await.map(Some)
    }
}
