use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::request::{Method, Request};

/// Time budget used by [`ReqwestTransport`] when a request carries none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Response returned by a [`Transport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failed exchange reported by a [`Transport`].
///
/// `status` is `None` when no usable response was received; retry
/// classification then falls back to inspecting `message`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
    /// Raw response body, when there was a response.
    pub body: Option<String>,
}

impl TransportError {
    /// Failure with a response carrying a non-success status.
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: format!("Request failed with status code {status}"),
            body: Some(body.into()),
        }
    }

    /// Failure without a usable response.
    pub fn no_response(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
        }
    }
}

/// Performs the actual network exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    default_timeout: Duration,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Transport on a fresh `reqwest::Client` with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Transport on a caller-configured `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the time budget applied when a request carries none.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let headers = header_map(&request.headers)?;

        let mut builder = self
            .http
            .request(reqwest_method(request.method), request.full_url())
            .headers(headers)
            .timeout(timeout);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(payload) = request.payload() {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;

        if !status.is_success() {
            return Err(TransportError::with_status(status.as_u16(), body));
        }

        Ok(Response {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            TransportError::no_response(format!("invalid header name '{name}': {err}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            TransportError::no_response(format!("invalid header value for '{name}': {err}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Maps `reqwest` failures onto messages the retry classifier recognizes.
fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::no_response(format!(
            "timeout of {}ms exceeded",
            timeout.as_millis()
        ));
    }
    // Redirect-policy failures are not network failures and must not retry.
    if err.is_redirect() {
        return TransportError::no_response(err.to_string());
    }
    // `is_request` covers connections dropped mid-exchange, not only refusals.
    if err.is_connect() || err.is_request() || err.is_body() {
        return TransportError::no_response(format!("Network Error: {err}"));
    }
    TransportError::no_response(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{header_map, Response, TransportError};

    #[test]
    fn status_error_keeps_status_and_body() {
        let err = TransportError::with_status(503, "busy");
        assert_eq!(err.status, Some(503));
        assert_eq!(err.body.as_deref(), Some("busy"));
        assert_eq!(err.to_string(), "Request failed with status code 503");
    }

    #[test]
    fn response_decodes_json_body() {
        let response = Response {
            status: 200,
            headers: BTreeMap::new(),
            body: r#"{"id": 7}"#.to_owned(),
        };
        let value: serde_json::Value = response.json().expect("body must decode");
        assert!(response.is_success());
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn invalid_header_name_is_rejected_without_status() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_owned(), "x".to_owned());
        let err = header_map(&headers).expect_err("must reject header name");
        assert_eq!(err.status, None);
        assert!(err.message.contains("invalid header name"));
    }
}
