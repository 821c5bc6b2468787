//! Transport abstraction
//!
//! The executor only needs "send this request, give me status and body".
//! Production uses a cookie-carrying ureq agent on the blocking pool; tests
//! plug in a scripted transport.

use super::{HttpRequest, HttpResponse, Method};
use crate::error::{FintrackError, FintrackResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Abstract HTTP transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange. Non-success statuses are returned, not raised.
    async fn send(&self, request: HttpRequest) -> FintrackResult<HttpResponse>;
}

/// ureq-backed transport
///
/// The agent's cookie jar is shared by every clone, so session cookies set
/// by the auth endpoints ride along on all later requests.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            timeout,
        }
    }

    fn send_blocking(&self, request: HttpRequest) -> FintrackResult<HttpResponse> {
        let HttpRequest {
            method,
            url,
            query,
            headers,
            body,
        } = request;

        let result = match method {
            Method::Get | Method::Delete => {
                let builder = match method {
                    Method::Get => self.agent.get(&url),
                    _ => self.agent.delete(&url),
                };
                let builder = decorate(builder, &query, &headers);
                match body {
                    Some(body) => builder.force_send_body().send(body.as_bytes()),
                    None => builder.call(),
                }
            }
            Method::Post | Method::Put | Method::Patch => {
                let builder = match method {
                    Method::Post => self.agent.post(&url),
                    Method::Put => self.agent.put(&url),
                    _ => self.agent.patch(&url),
                };
                let builder = decorate(builder, &query, &headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| match e {
            ureq::Error::Timeout(_) => FintrackError::Timeout {
                url: url.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            },
            other => FintrackError::network(&url, other),
        })?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| FintrackError::network(&url, e))?;

        trace!("{} {} -> {}", method, url, status.as_u16());

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

fn decorate<B>(
    builder: ureq::RequestBuilder<B>,
    query: &[(String, String)],
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    let mut builder = builder.query_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> FintrackResult<HttpResponse> {
        let transport = self.clone();
        tokio::task::spawn_blocking(move || transport.send_blocking(request))
            .await
            .map_err(|e| FintrackError::Internal(format!("transport task failed: {}", e)))?
    }
}
