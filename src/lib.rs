//! `hookhttp` is an async HTTP client façade with automatic retry, request
//! interception and keyed client cloning.
//!
//! - [`HttpClient::get`], [`HttpClient::post`], … and
//!   [`HttpClient::make_request`] issue requests through the pipeline
//! - [`ClientConfig`] carries base url, timeout, headers and retry policy
//! - [`CredentialRefresh`] rewrites every outgoing request, retries included
//! - [`HttpClient::clone_with`] derives cached, keyed client variants
//!
//! The network exchange itself is delegated to a [`Transport`];
//! [`ReqwestTransport`] is used by default.

mod backoff;
mod client;
mod config;
mod error;
mod interceptor;
mod registry;
mod request;
mod retry;
mod transport;

pub use backoff::{backoff_delay, wait_before_retry};
pub use client::HttpClient;
pub use config::{
    ClientConfig, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_ERROR_CODES,
};
pub use error::{BoxError, Error};
pub use interceptor::{refresh_with, CredentialRefresh, RefreshResult};
pub use request::{Method, Request, RequestDescriptor, RequestOptions, DEFAULT_CONTENT_TYPE};
pub use retry::{classify, should_retry, RetryReason, RetryState};
pub use transport::{ReqwestTransport, Response, Transport, TransportError, DEFAULT_TIMEOUT};

pub type Result<T> = std::result::Result<T, Error>;
