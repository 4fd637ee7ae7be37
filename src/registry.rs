use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{ClientConfig, HttpClient};

/// Keyed cache of instances derived from one parent client.
///
/// Empty keys are rejected: every operation returns `None` and leaves the
/// map untouched.
#[derive(Default)]
pub(crate) struct InstanceRegistry {
    instances: Mutex<HashMap<String, HttpClient>>,
}

impl InstanceRegistry {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, HttpClient>> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self, key: &str) -> Option<HttpClient> {
        if !is_valid_key(key) {
            return None;
        }
        self.entries().get(key).cloned()
    }

    /// Returns the instance stored under `key` with `overrides` merged into
    /// its configuration, creating it with `create` when absent.
    pub(crate) fn derive<F>(
        &self,
        key: &str,
        overrides: &ClientConfig,
        create: F,
    ) -> Option<HttpClient>
    where
        F: FnOnce() -> HttpClient,
    {
        if !is_valid_key(key) {
            return None;
        }

        let mut entries = self.entries();
        if let Some(existing) = entries.get(key) {
            existing.merge_config(overrides);
            return Some(existing.clone());
        }

        let instance = create();
        entries.insert(key.to_owned(), instance.clone());

        #[cfg(feature = "tracing")]
        tracing::debug!(key, "registered derived client instance");

        Some(instance)
    }

    pub(crate) fn remove(&self, key: &str) -> Option<HttpClient> {
        if !is_valid_key(key) {
            return None;
        }
        let removed = self.entries().remove(key);

        #[cfg(feature = "tracing")]
        if removed.is_some() {
            tracing::debug!(key, "removed derived client instance");
        }

        removed
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::InstanceRegistry;
    use crate::{ClientConfig, HttpClient, Request, Response, Transport, TransportError};

    struct NoopTransport;

    #[async_trait::async_trait]
    impl Transport for NoopTransport {
        async fn send(&self, _request: Request) -> Result<Response, TransportError> {
            Err(TransportError::no_response("unused"))
        }
    }

    fn client(config: ClientConfig) -> HttpClient {
        HttpClient::with_transport(config, Arc::new(NoopTransport))
    }

    #[test]
    fn empty_key_is_rejected_without_mutation() {
        let registry = InstanceRegistry::default();
        let created = registry.derive("", &ClientConfig::new(), || client(ClientConfig::new()));
        assert!(created.is_none());
        assert!(registry.get("").is_none());
        assert!(registry.remove("").is_none());
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn derive_creates_once_then_merges() {
        let registry = InstanceRegistry::default();
        let first = registry
            .derive("k", &ClientConfig::new(), || {
                client(ClientConfig::new().with_header("a", "1"))
            })
            .expect("valid key");
        let second = registry
            .derive("k", &ClientConfig::new().with_header("b", "2"), || {
                panic!("existing instance must be reused")
            })
            .expect("valid key");

        assert!(first.ptr_eq(&second));
        let headers = second.config().headers;
        assert_eq!(headers["a"], "1");
        assert_eq!(headers["b"], "2");
        assert_eq!(registry.keys(), vec!["k".to_owned()]);
    }

    #[test]
    fn remove_missing_key_is_noop() {
        let registry = InstanceRegistry::default();
        registry.derive("present", &ClientConfig::new(), || client(ClientConfig::new()));
        assert!(registry.remove("missing").is_none());
        assert_eq!(registry.keys(), vec!["present".to_owned()]);
    }
}
