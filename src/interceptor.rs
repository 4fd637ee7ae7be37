//! Outgoing and incoming hook chains run once per attempt.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::BoxError,
    retry::{should_retry, RetryState},
    ClientConfig, Error, Request, Response, Result, TransportError,
};

/// Outcome of a [`CredentialRefresh`] call.
pub type RefreshResult = std::result::Result<Option<Request>, BoxError>;

/// Capability invoked with every outgoing request, retries included.
///
/// Returning `Ok(Some(request))` replaces the outgoing request verbatim;
/// `Ok(None)` leaves it unchanged. An error fails the call before the
/// transport is reached.
#[async_trait]
pub trait CredentialRefresh: Send + Sync {
    async fn refresh(&self, request: &Request) -> RefreshResult;
}

struct FnRefresh<F>(F);

#[async_trait]
impl<F, Fut> CredentialRefresh for FnRefresh<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RefreshResult> + Send + 'static,
{
    async fn refresh(&self, request: &Request) -> RefreshResult {
        (self.0)(request.clone()).await
    }
}

/// Wraps an async closure as a [`CredentialRefresh`].
///
/// ```no_run
/// use hookhttp::{refresh_with, ClientConfig};
///
/// let hook = refresh_with(|mut req| async move {
///     req.set_header("Authorization", "Bearer fresh");
///     Ok(Some(req))
/// });
/// let config = ClientConfig::new().with_refresh_token_callback(hook);
/// ```
pub fn refresh_with<F, Fut>(hook: F) -> Arc<dyn CredentialRefresh>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RefreshResult> + Send + 'static,
{
    Arc::new(FnRefresh(hook))
}

/// Runs the outgoing chain against one attempt's request.
pub(crate) async fn outgoing(config: &ClientConfig, request: Request) -> Result<Request> {
    let Some(hook) = &config.refresh_token_callback else {
        return Ok(request);
    };

    match hook.refresh(&request).await {
        Ok(Some(replacement)) => Ok(replacement),
        Ok(None) => Ok(request),
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("credential refresh failed for {}: {}", request.url, err);

            Err(Error::Refresh(err))
        }
    }
}

/// What the incoming chain decided for one attempt.
#[derive(Debug)]
pub(crate) enum Incoming {
    Resolved(Response),
    Retry,
    Rejected(Error),
}

/// Runs the incoming chain against one attempt's outcome.
///
/// Successful responses pass through untouched. Failures are handed to the
/// retry evaluator, which advances `state` when it approves another attempt.
pub(crate) fn incoming(
    outcome: std::result::Result<Response, TransportError>,
    config: &ClientConfig,
    state: &mut RetryState,
) -> Incoming {
    match outcome {
        Ok(response) => Incoming::Resolved(response),
        Err(err) if should_retry(&err, config, state) => Incoming::Retry,
        Err(err) => Incoming::Rejected(Error::Transport(err)),
    }
}
