use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{config::insert_header, ClientConfig, Error};

/// Header added to every request unless configuration overrides it.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Supported HTTP verbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Case-insensitive; anything outside the fixed verb set is
    /// [`Error::UnroutableMethod`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnroutableMethod(s.to_owned()))
    }
}

/// Per-call options, layered over the issuing instance's configuration.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Overrides merged over the instance configuration for this call only.
    pub config: ClientConfig,
    /// Query string parameters.
    pub params: Vec<(String, String)>,
    /// Request payload. PATCH sends it as the body; other verbs pass it
    /// through to the transport with the rest of the options.
    pub data: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the per-call configuration overrides.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a header for this call, replacing any same-named one in any case.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.config.headers, name.into(), value.into());
        self
    }

    /// Appends a query string parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Sets the request payload.
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the time budget for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }
}

/// Generic `{method, url, ...options}` descriptor accepted by
/// [`HttpClient::make_request`](crate::HttpClient::make_request).
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    pub options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Fully resolved outgoing request, as seen by the credential-refresh hook
/// and the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub params: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Body separated out of the options (PATCH only).
    pub body: Option<serde_json::Value>,
    /// Per-call data passed through with the options.
    pub data: Option<serde_json::Value>,
}

impl Request {
    /// Builds the request for one attempt from the effective configuration.
    pub(crate) fn resolve(
        method: Method,
        url: &str,
        config: &ClientConfig,
        options: &RequestOptions,
        body: Option<serde_json::Value>,
    ) -> Self {
        let mut request = Self {
            method,
            url: url.to_owned(),
            base_url: config.base_url.clone(),
            headers: BTreeMap::new(),
            params: options.params.clone(),
            timeout: config.timeout,
            body,
            data: options.data.clone(),
        };

        request.set_header("Content-Type", DEFAULT_CONTENT_TYPE);
        for (name, value) in &config.headers {
            request.set_header(name, value);
        }

        request
    }

    /// Absolute url: `url` itself when absolute, otherwise joined to `base_url`.
    pub fn full_url(&self) -> String {
        let is_absolute = self.url.starts_with("http://") || self.url.starts_with("https://");
        match &self.base_url {
            Some(base) if !is_absolute && !self.url.is_empty() => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.url.trim_start_matches('/')
            ),
            Some(base) if !is_absolute => base.clone(),
            _ => self.url.clone(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a header, replacing any existing one with the same name in any case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Payload to put on the wire, if any.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.body.as_ref().or(self.data.as_ref())
    }
}
