//! Pluggable access to the SignalFx REST API
//!
//! The reconciliation engine only ever talks to a [`Transport`]. Two
//! implementations ship with the crate: [`HttpTransport`] for the real API and
//! [`MemoryTransport`], an in-process emulation used by tests and dry
//! experiments.

use std::fmt;

use serde_json::Value;

use crate::error::TransportResult;

pub mod http;
pub mod memory;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// HTTP verbs used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read or search
    Get,
    /// Create
    Post,
    /// Replace
    Put,
    /// Remove
    Delete,
}

impl Method {
    /// Upper-case verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call against the API, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb
    pub method: Method,
    /// Path such as `/chart` or `/chart/{id}`
    pub path: String,
    /// Query parameters in insertion order
    pub params: Vec<(String, String)>,
    /// JSON body, if any
    pub body: Option<Value>,
    /// API token sent with the request
    pub token: String,
}

impl ApiRequest {
    /// Request without parameters, body or token.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            token: String::new(),
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// `POST path` with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    /// `PUT path` with a JSON body.
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach the API token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// First value of query parameter `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Executes API requests and returns the decoded JSON response.
///
/// Implementations map non-success statuses to [`TransportError`] and return
/// `Value::Null` for empty or undecodable success bodies.
///
/// [`TransportError`]: crate::error::TransportError
pub trait Transport {
    /// Perform `request`.
    fn execute(&self, request: &ApiRequest) -> TransportResult<Value>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &ApiRequest) -> TransportResult<Value> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &ApiRequest) -> TransportResult<Value> {
        (**self).execute(request)
    }
}
