//! Single HTTP exchange
//!
//! Serializes the body, negotiates headers, enforces the request timeout and
//! turns the raw response into a [`Reply`] or a typed error.

use super::{ApiRequest, HttpRequest, HttpResponse, Reply, RequestBody, Transport};
use crate::error::{FintrackError, FintrackResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};
use uuid::Uuid;

const ACCEPT: &str = "application/json, text/plain, */*";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Issues one exchange per call, no retries
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, timeout: Duration) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Resolve a request path against the API base
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Perform the exchange described by `request`
    pub async fn execute(&self, request: &ApiRequest) -> FintrackResult<Reply> {
        let request_id = Uuid::new_v4();
        let http = self.prepare(request, request_id)?;
        let span = tracing::debug_span!(
            "http",
            request_id = %request_id,
            method = %http.method,
            url = %http.url
        );

        async move {
            let url = http.url.clone();
            let response = match tokio::time::timeout(self.timeout, self.transport.send(http)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    debug!("Timed out after {:?}", self.timeout);
                    return Err(FintrackError::Timeout {
                        url,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
            };
            debug!("Received status {}", response.status);
            interpret(url, response)
        }
        .instrument(span)
        .await
    }

    fn prepare(&self, request: &ApiRequest, request_id: Uuid) -> FintrackResult<HttpRequest> {
        let mut headers = vec![
            ("Accept".to_string(), ACCEPT.to_string()),
            ("X-Request-Id".to_string(), request_id.to_string()),
        ];
        headers.extend(request.headers.iter().cloned());

        let body = match &request.body {
            None => None,
            Some(RequestBody::Text(text)) => Some(text.clone()),
            Some(RequestBody::Json(value)) => Some(serde_json::to_string(value)?),
        };

        let has_content_type = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
        if body.is_some() && !has_content_type {
            headers.push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
        }

        Ok(HttpRequest {
            method: request.effective_method(),
            url: self.url_for(&request.path),
            query: request.query.clone(),
            headers,
            body,
        })
    }
}

/// Map a raw response onto a reply or an `Http` error
fn interpret(url: String, response: HttpResponse) -> FintrackResult<Reply> {
    if !response.is_success() {
        let body = if response.body.is_empty() {
            response.status_text
        } else {
            response.body
        };
        return Err(FintrackError::Http {
            url,
            status: response.status,
            body,
        });
    }

    if response.body.is_empty() {
        return Ok(Reply::Empty);
    }

    match serde_json::from_str(&response.body) {
        Ok(value) => Ok(Reply::Json(value)),
        Err(_) => Ok(Reply::Text(response.body)),
    }
}
