//! Retry policy evaluation.
//!
//! Attempt bookkeeping lives in a [`RetryState`] owned by a single request
//! lineage. It is never stored on the shared [`ClientConfig`].

use crate::{ClientConfig, TransportError};

/// Retries made so far by one request lineage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retries approved so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Why a failure was considered retryable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// Response status is in the configured retryable set.
    Status(u16),
    /// No usable response; message mentions a network error.
    NetworkError,
    /// No usable response; message mentions a timeout.
    Timeout,
}

/// Classifies a transport failure, ignoring whether retry is enabled.
pub fn classify(error: &TransportError, config: &ClientConfig) -> Option<RetryReason> {
    if let Some(status) = error.status {
        return config
            .is_retryable_status(status)
            .then_some(RetryReason::Status(status));
    }

    let message = error.message.to_ascii_lowercase();
    if message.contains("network error") {
        Some(RetryReason::NetworkError)
    } else if message.contains("timeout") {
        Some(RetryReason::Timeout)
    } else {
        None
    }
}

/// Decides whether the lineage owning `state` should make another attempt.
///
/// Increments `state` by exactly one when the answer is yes.
pub fn should_retry(
    error: &TransportError,
    config: &ClientConfig,
    state: &mut RetryState,
) -> bool {
    if !config.retry_enabled() {
        return false;
    }

    if state.attempts >= config.retry_count() {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempts = state.attempts,
            "retry budget exhausted: {}",
            error.message
        );
        return false;
    }

    match classify(error, config) {
        Some(_reason) => {
            state.attempts += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = state.attempts,
                reason = ?_reason,
                "retrying request: {}",
                error.message
            );

            true
        }
        None => false,
    }
}
