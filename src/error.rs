use crate::transport::TransportError;

/// Boxed error returned by user-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Terminal transport failure: retry disabled, retries exhausted, or the
    /// failure did not match any retryable classification.
    #[error(transparent)]
    Transport(TransportError),
    /// The credential-refresh hook failed; the transport was not called.
    #[error("credential refresh failed: {0}")]
    Refresh(#[source] BoxError),
    /// Method string outside the supported verb set.
    #[error("unroutable method '{0}'")]
    UnroutableMethod(String),
}

impl Error {
    /// HTTP status of the final transport response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status,
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}
