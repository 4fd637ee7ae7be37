use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    backoff::wait_before_retry,
    interceptor::{self, Incoming},
    registry::InstanceRegistry,
    retry::RetryState,
    ClientConfig, Method, ReqwestTransport, Request, RequestDescriptor, RequestOptions, Response,
    Result, Transport,
};

/// HTTP client with retry/backoff, credential refresh and keyed cloning.
///
/// `HttpClient` is a cheap handle: cloning it with [`Clone`] yields the same
/// instance. Use [`HttpClient::clone_with`] to derive a variant with its own
/// configuration.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: RwLock<ClientConfig>,
    transport: Arc<dyn Transport>,
    instances: InstanceRegistry,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config())
            .field("instances", &self.instance_keys())
            .finish()
    }
}

impl HttpClient {
    /// Creates a client on the default `reqwest` transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Creates a client on a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                transport,
                instances: InstanceRegistry::default(),
            }),
        }
    }

    /// Creates a client configured from `HOOKHTTP_*` environment variables.
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> std::result::Result<Self, String> {
        ClientConfig::from_env().map(Self::new)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the configuration wholesale.
    pub fn set_config(&self, config: ClientConfig) {
        *self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Layers `overrides` over the current configuration.
    ///
    /// Requests already in flight pick up the change on their next attempt.
    pub fn merge_config(&self, overrides: &ClientConfig) {
        let mut config = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *config = config.merge(overrides);
    }

    /// Returns the derived instance registered under `key`.
    ///
    /// The first call for a key builds an instance from this client's
    /// configuration merged with `overrides`. Later calls return that same
    /// instance after merging `overrides` into its configuration. Returns
    /// `None` for an empty key.
    #[doc(alias = "clone")]
    pub fn clone_with(&self, overrides: &ClientConfig, key: &str) -> Option<HttpClient> {
        self.inner.instances.derive(key, overrides, || {
            HttpClient::with_transport(
                self.config().merge(overrides),
                Arc::clone(&self.inner.transport),
            )
        })
    }

    /// Looks up a derived instance without modifying it.
    pub fn instance(&self, key: &str) -> Option<HttpClient> {
        self.inner.instances.get(key)
    }

    /// Keys of the derived instances, sorted.
    pub fn instance_keys(&self) -> Vec<String> {
        self.inner.instances.keys()
    }

    /// Forgets the derived instance registered under `key`.
    ///
    /// Handles to the removed instance keep working. Empty or unknown keys
    /// are a no-op returning `None`.
    pub fn remove_instance(&self, key: &str) -> Option<HttpClient> {
        self.inner.instances.remove(key)
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &HttpClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Routes a generic `{method, url, options}` descriptor to the matching
    /// verb method.
    ///
    /// Fails with [`Error::UnroutableMethod`](crate::Error::UnroutableMethod)
    /// without touching the transport when the method is not a supported verb.
    pub async fn make_request(&self, descriptor: RequestDescriptor) -> Result<Response> {
        let RequestDescriptor {
            method,
            url,
            options,
        } = descriptor;

        match method.parse::<Method>()? {
            Method::Get => self.get(&url, options).await,
            Method::Post => self.post(&url, options).await,
            Method::Put => self.put(&url, options).await,
            Method::Delete => self.delete(&url, options).await,
            Method::Patch => self.patch(&url, options).await,
            Method::Head => self.head(&url, options).await,
            Method::Options => self.options(&url, options).await,
        }
    }

    /// Sends a GET request through the retry pipeline.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with_retry(Method::Get, url, options, None).await
    }

    /// Sends a POST request; `options.data` travels with the options.
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with_retry(Method::Post, url, options, None).await
    }

    /// Sends a PUT request through the retry pipeline.
    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with_retry(Method::Put, url, options, None).await
    }

    /// Sends `options.data` as the body, separate from the other options.
    /// A missing `data` is sent as an empty JSON object.
    pub async fn patch(&self, url: &str, mut options: RequestOptions) -> Result<Response> {
        let body = options
            .data
            .take()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        self.send_with_retry(Method::Patch, url, options, Some(body))
            .await
    }

    /// Sends a DELETE request through the retry pipeline.
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with_retry(Method::Delete, url, options, None)
            .await
    }

    /// Sends a HEAD request through the retry pipeline.
    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with_retry(Method::Head, url, options, None).await
    }

    /// Sends an OPTIONS request through the retry pipeline.
    pub async fn options(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with_retry(Method::Options, url, options, None)
            .await
    }

    /// Drives one request lineage to a single resolution.
    ///
    /// Each attempt re-reads this instance's configuration, runs the outgoing
    /// chain, calls the transport, then the incoming chain. Approved retries
    /// wait `retry_delay * attempt` and go around again with the same inputs.
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let mut state = RetryState::new();
        loop {
            let config = self.config().merge(&options.config);
            let request = Request::resolve(method, url, &config, &options, body.clone());
            let request = interceptor::outgoing(&config, request).await?;
            let outcome = self.inner.transport.send(request).await;

            match interceptor::incoming(outcome, &config, &mut state) {
                Incoming::Resolved(response) => return Ok(response),
                Incoming::Retry => wait_before_retry(config.retry_delay(), state.attempts()).await,
                Incoming::Rejected(err) => return Err(err),
            }
        }
    }
}
