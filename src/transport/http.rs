//! Blocking HTTP transport backed by `reqwest`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{ApiRequest, Method, Transport};
use crate::config::ClientConfig;
use crate::error::{TransportError, TransportResult};

/// Header carrying the SignalFx API token.
pub const TOKEN_HEADER: &str = "X-SF-Token";

/// Transport talking to a live SignalFx-compatible API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `base_url`, e.g. `https://api.signalfx.com/v2`.
    pub fn new(base_url: impl Into<String>, timeout_secs: Option<u64>) -> TransportResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a transport from client configuration.
    pub fn from_config(config: &ClientConfig) -> TransportResult<Self> {
        Self::new(config.base_url.clone(), config.timeout_secs)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn headers(token: &str) -> TransportResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(token)
            .map_err(|err| TransportError::InvalidToken(err.to_string()))?;
        headers.insert(HeaderName::from_static("x-sf-token"), value);
        Ok(headers)
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Map a non-success status to its error variant.
pub(crate) fn status_error(method: Method, url: String, status: u16, body: String) -> TransportError {
    match StatusCode::from_u16(status) {
        Ok(StatusCode::UNAUTHORIZED) => TransportError::Unauthorized,
        Ok(StatusCode::METHOD_NOT_ALLOWED) => TransportError::MethodNotAllowed {
            method: method.to_string(),
            url,
        },
        _ => TransportError::Status {
            method: method.to_string(),
            url,
            status,
            body,
        },
    }
}

/// Decode a success body, treating empty or malformed JSON as no content.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|err| {
        debug!(error = %err, "response body is not JSON; treating as empty");
        Value::Null
    })
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    fn execute(&self, request: &ApiRequest) -> TransportResult<Value> {
        let url = self.url(&request.path);
        debug!(%url, params = ?request.params, "sending request");

        let mut builder = self
            .client
            .request(reqwest_method(request.method), &url)
            .headers(Self::headers(&request.token)?);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let text = response
            .text()
            .unwrap_or_else(|_| "<failed to read response body>".to_string());

        if !status.is_success() {
            return Err(status_error(request.method, url, status.as_u16(), text));
        }
        debug!(status = status.as_u16(), "request succeeded");
        Ok(decode_body(&text))
    }
}
