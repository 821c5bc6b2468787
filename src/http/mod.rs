//! HTTP plumbing shared by every API call
//!
//! `ApiRequest` is what callers build, `HttpRequest`/`HttpResponse` are what
//! a [`Transport`] moves over the wire, and `Reply` is what the executor hands
//! back after interpreting the response.

mod executor;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use executor::RequestExecutor;
pub use transport::{Transport, UreqTransport};

use crate::error::{FintrackError, FintrackResult};
use serde::de::DeserializeOwned;
use std::fmt;

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = FintrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(FintrackError::User(format!(
                "Unknown HTTP method '{}'. Valid methods: GET, POST, PUT, PATCH, DELETE",
                other
            ))),
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized to JSON before sending
    Json(serde_json::Value),
    /// Sent verbatim
    Text(String),
}

/// A request as issued by a caller of the access layer
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Path relative to the API base, or an absolute `http(s)://` URL
    pub path: String,
    /// Explicit method; see [`ApiRequest::effective_method`]
    pub method: Option<Method>,
    pub body: Option<RequestBody>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    /// Request with no method, body or headers set
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: None,
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path).method(Method::Get)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path).method(Method::Post)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(path).method(Method::Put)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path).method(Method::Delete)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Attach a JSON body
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Attach a body that is already serialized
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// `GET` unless a body is present, in which case `POST`
    pub fn effective_method(&self) -> Method {
        match (self.method, &self.body) {
            (Some(method), _) => method,
            (None, Some(_)) => Method::Post,
            (None, None) => Method::Get,
        }
    }
}

/// Wire-level request handed to a [`Transport`]
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Look up a header value, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Wire-level response returned by a [`Transport`]
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Interpreted response of a successful exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Success with an empty body
    Empty,
    Json(serde_json::Value),
    /// Success with a body that is not JSON
    Text(String),
}

impl Reply {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// JSON view of the reply; `Empty` becomes `null`
    pub fn into_json(self) -> FintrackResult<serde_json::Value> {
        match self {
            Self::Empty => Ok(serde_json::Value::Null),
            Self::Json(value) => Ok(value),
            Self::Text(text) => Err(FintrackError::UnexpectedResponse(format!(
                "expected JSON, got text: {}",
                truncate(&text, 120)
            ))),
        }
    }

    /// Deserialize the reply into `T`
    pub fn decode<T: DeserializeOwned>(self) -> FintrackResult<T> {
        let value = self.into_json()?;
        serde_json::from_value(value)
            .map_err(|e| FintrackError::UnexpectedResponse(e.to_string()))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("null"),
            Self::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => f.write_str(&pretty),
                Err(_) => write!(f, "{}", value),
            },
            Self::Text(text) => f.write_str(text),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
