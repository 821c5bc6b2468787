//! Scripted in-process transport for tests

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::{FintrackError, FintrackResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Scripted outcome of one exchange
#[derive(Debug, Clone)]
pub enum MockReply {
    Status { status: u16, body: String },
    Network(String),
}

impl MockReply {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::Status {
            status,
            body: value.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::text(status, "")
    }

    pub fn network(reason: &str) -> Self {
        Self::Network(reason.to_string())
    }
}

type RouteKey = (Method, String);

/// Transport answering from per-route reply scripts
///
/// Replies for a route are consumed in order; the last one repeats. A route
/// can be held closed until the test releases permits on its gate.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<RouteKey, VecDeque<MockReply>>>,
    gates: Mutex<HashMap<RouteKey, Arc<Semaphore>>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `method path`
    pub fn reply(&self, method: Method, path: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Hold every exchange on `method path` until a permit is added
    pub fn hold(&self, method: Method, path: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert((method, path.to_string()), gate.clone());
        gate
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Number of requests seen for `method path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .count()
    }

    fn next_reply(&self, key: &RouteKey) -> Option<MockReply> {
        let mut routes = self.routes.lock().unwrap();
        let script = routes.get_mut(key)?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .find('/')
        .map_or("/", |idx| &without_scheme[idx..])
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> FintrackResult<HttpResponse> {
        let key = (request.method, path_of(&request.url).to_string());
        self.log.lock().unwrap().push(request.clone());

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| FintrackError::Internal(e.to_string()))?
                .forget();
        }

        match self.next_reply(&key) {
            Some(MockReply::Status { status, body }) => Ok(HttpResponse {
                status,
                status_text: status_text(status).to_string(),
                body,
            }),
            Some(MockReply::Network(reason)) => Err(FintrackError::network(&request.url, reason)),
            None => Ok(HttpResponse {
                status: 404,
                status_text: status_text(404).to_string(),
                body: format!("no route for {} {}", key.0, key.1),
            }),
        }
    }
}

/// Yield to other tasks until `condition` holds
pub async fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        tokio::task::yield_now().await;
    }
}
