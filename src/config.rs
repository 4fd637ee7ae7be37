use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::interceptor::CredentialRefresh;

/// Retries made after the initial attempt when `retry_count` is unset.
pub const DEFAULT_RETRY_COUNT: u32 = 2;

/// Statuses retried when `retry_error_codes` is unset.
pub const DEFAULT_RETRY_ERROR_CODES: [u16; 4] = [500, 502, 503, 504];

/// Backoff unit when `retry_delay` is unset.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2_000);

/// Client defaults: base address, timeout, headers and retry policy.
///
/// Every field is optional so that [`ClientConfig::merge`] can tell "absent"
/// from "set". Effective values are read through the accessor methods, which
/// fill in the defaults.
///
/// Deserializes from JSON using the option names `baseURL`, `timeout`,
/// `headers`, `retry`, `retryCount`, `retryErrorCodes` and `retryDelay`;
/// durations are given in milliseconds.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Prefix joined to relative request urls.
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    /// Per-request time budget handed to the transport.
    #[serde(default, deserialize_with = "millis")]
    pub timeout: Option<Duration>,
    /// Default headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Enables retry policy evaluation.
    pub retry: Option<bool>,
    /// Maximum retries after the initial attempt.
    pub retry_count: Option<u32>,
    /// Statuses considered retryable.
    pub retry_error_codes: Option<BTreeSet<u16>>,
    /// Backoff unit, multiplied by the retry number.
    #[serde(default, deserialize_with = "millis")]
    pub retry_delay: Option<Duration>,
    /// Hook invoked on every outgoing request, retries included.
    #[serde(skip)]
    pub refresh_token_callback: Option<Arc<dyn CredentialRefresh>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("retry", &self.retry)
            .field("retry_count", &self.retry_count)
            .field("retry_error_codes", &self.retry_error_codes)
            .field("retry_delay", &self.retry_delay)
            .field(
                "refresh_token_callback",
                &self.refresh_token_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Empty configuration; every accessor falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a JSON document.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builds a configuration from environment variables.
    ///
    /// Reads, all optional:
    /// - `HOOKHTTP_BASE_URL`
    /// - `HOOKHTTP_TIMEOUT_MS`
    /// - `HOOKHTTP_RETRY` (`true`/`false`)
    /// - `HOOKHTTP_RETRY_COUNT`
    /// - `HOOKHTTP_RETRY_DELAY_MS`
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut config = Self::default();
        if let Some(url) = env_var("HOOKHTTP_BASE_URL") {
            config.base_url = Some(url);
        }
        if let Some(ms) = env_parse::<u64>("HOOKHTTP_TIMEOUT_MS")? {
            config.timeout = Some(Duration::from_millis(ms));
        }
        config.retry = env_parse::<bool>("HOOKHTTP_RETRY")?;
        config.retry_count = env_parse::<u32>("HOOKHTTP_RETRY_COUNT")?;
        if let Some(ms) = env_parse::<u64>("HOOKHTTP_RETRY_DELAY_MS")? {
            config.retry_delay = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }

    /// Sets the prefix joined to relative request urls.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-request time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a default header, replacing any existing one with the same name
    /// in any case.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, name.into(), value.into());
        self
    }

    /// Enables or disables retries.
    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.retry = Some(enabled);
        self
    }

    /// Sets the maximum number of retries after the initial attempt.
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Replaces the set of retryable statuses.
    pub fn with_retry_error_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.retry_error_codes = Some(codes.into_iter().collect());
        self
    }

    /// Sets the backoff unit, multiplied by the retry number.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Installs the hook run against every outgoing request.
    pub fn with_refresh_token_callback(mut self, hook: Arc<dyn CredentialRefresh>) -> Self {
        self.refresh_token_callback = Some(hook);
        self
    }

    /// Whether retries are enabled, `false` when unset.
    pub fn retry_enabled(&self) -> bool {
        self.retry.unwrap_or(false)
    }

    /// Retry budget, [`DEFAULT_RETRY_COUNT`] when unset.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.unwrap_or(DEFAULT_RETRY_COUNT)
    }

    /// Backoff unit, [`DEFAULT_RETRY_DELAY`] when unset.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY)
    }

    /// Whether `status` is in the configured or default retryable set.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        match &self.retry_error_codes {
            Some(codes) => codes.contains(&status),
            None => DEFAULT_RETRY_ERROR_CODES.contains(&status),
        }
    }

    /// Returns a new configuration with `other` layered over `self`.
    ///
    /// Fields set in `other` win; headers are shallow-merged with `other`
    /// winning on collisions, names compared case-insensitively. Neither input
    /// is modified.
    pub fn merge(&self, other: &ClientConfig) -> ClientConfig {
        let mut headers = self.headers.clone();
        for (name, value) in &other.headers {
            insert_header(&mut headers, name.clone(), value.clone());
        }

        ClientConfig {
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            timeout: other.timeout.or(self.timeout),
            headers,
            retry: other.retry.or(self.retry),
            retry_count: other.retry_count.or(self.retry_count),
            retry_error_codes: other
                .retry_error_codes
                .clone()
                .or_else(|| self.retry_error_codes.clone()),
            retry_delay: other.retry_delay.or(self.retry_delay),
            refresh_token_callback: other
                .refresh_token_callback
                .clone()
                .or_else(|| self.refresh_token_callback.clone()),
        }
    }
}

/// Header names are case-insensitive on the wire; the newest spelling wins.
pub(crate) fn insert_header(headers: &mut BTreeMap<String, String>, name: String, value: String) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

fn millis<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> std::result::Result<Option<T>, String> {
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{name} has an invalid value: '{raw}'")),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::{ClientConfig, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};
    use crate::interceptor::refresh_with;

    // The process environment is shared between test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 5] = [
        "HOOKHTTP_BASE_URL",
        "HOOKHTTP_TIMEOUT_MS",
        "HOOKHTTP_RETRY",
        "HOOKHTTP_RETRY_COUNT",
        "HOOKHTTP_RETRY_DELAY_MS",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        let out = f();
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
        out
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::default();
        assert!(!config.retry_enabled());
        assert_eq!(config.retry_count(), DEFAULT_RETRY_COUNT);
        assert_eq!(config.retry_delay(), DEFAULT_RETRY_DELAY);
        for status in [500, 502, 503, 504] {
            assert!(config.is_retryable_status(status));
        }
        assert!(!config.is_retryable_status(404));
    }

    #[test]
    fn explicit_zero_overrides_defaults() {
        let config = ClientConfig::new()
            .with_retry_count(0)
            .with_retry_delay(Duration::ZERO);
        assert_eq!(config.retry_count(), 0);
        assert_eq!(config.retry_delay(), Duration::ZERO);
    }

    #[test]
    fn merge_prefers_override_and_merges_headers() {
        let base = ClientConfig::new()
            .with_base_url("https://a.example")
            .with_timeout(Duration::from_secs(5))
            .with_header("x-app", "base")
            .with_header("x-keep", "1");
        let over = ClientConfig::new()
            .with_base_url("https://b.example")
            .with_header("x-app", "override")
            .with_retry(true);

        let merged = base.merge(&over);

        assert_eq!(merged.base_url.as_deref(), Some("https://b.example"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.headers["x-app"], "override");
        assert_eq!(merged.headers["x-keep"], "1");
        assert!(merged.retry_enabled());

        // inputs untouched
        assert_eq!(base.headers["x-app"], "base");
        assert_eq!(base.retry, None);
        assert_eq!(over.headers.len(), 1);
    }

    #[test]
    fn merge_keeps_base_callback_when_override_has_none() {
        let base = ClientConfig::new()
            .with_refresh_token_callback(refresh_with(|_req| async { Ok(None) }));
        let merged = base.merge(&ClientConfig::new());
        assert!(merged.refresh_token_callback.is_some());
    }

    #[test]
    fn parses_documented_option_names() {
        let config = ClientConfig::from_json(
            r#"{
                "baseURL": "https://api.example",
                "timeout": 1500,
                "headers": { "x-app": "demo" },
                "retry": true,
                "retryCount": 3,
                "retryErrorCodes": [429, 503],
                "retryDelay": 100
            }"#,
        )
        .expect("config must parse");

        assert_eq!(config.base_url.as_deref(), Some("https://api.example"));
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.headers["x-app"], "demo");
        assert!(config.retry_enabled());
        assert_eq!(config.retry_count(), 3);
        assert!(config.is_retryable_status(429));
        assert!(!config.is_retryable_status(500));
        assert_eq!(config.retry_delay(), Duration::from_millis(100));
    }

    #[test]
    fn debug_redacts_callback() {
        let config = ClientConfig::new()
            .with_refresh_token_callback(refresh_with(|_req| async { Ok(None) }));
        let debug = format!("{config:?}");
        assert!(debug.contains("<callback>"));
    }

    #[test]
    fn merge_override_wins_across_header_name_case() {
        let base = ClientConfig::new().with_header("authorization", "old");
        let over = ClientConfig::new().with_header("Authorization", "new");

        let merged = base.merge(&over);

        assert_eq!(merged.headers.len(), 1);
        assert_eq!(merged.headers["Authorization"], "new");

        let back = over.merge(&base);
        assert_eq!(back.headers.len(), 1);
        assert_eq!(back.headers["authorization"], "old");
    }

    #[test]
    fn with_header_replaces_other_spelling() {
        let config = ClientConfig::new()
            .with_header("X-App", "one")
            .with_header("x-app", "two");
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers["x-app"], "two");
    }

    #[test]
    fn from_env_reads_documented_variables() {
        let config = with_env(
            &[
                ("HOOKHTTP_BASE_URL", "https://env.example"),
                ("HOOKHTTP_TIMEOUT_MS", "1500"),
                ("HOOKHTTP_RETRY", "true"),
                ("HOOKHTTP_RETRY_COUNT", "4"),
                ("HOOKHTTP_RETRY_DELAY_MS", " 250 "),
            ],
            ClientConfig::from_env,
        )
        .expect("valid environment must parse");

        assert_eq!(config.base_url.as_deref(), Some("https://env.example"));
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert!(config.retry_enabled());
        assert_eq!(config.retry_count(), 4);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn from_env_without_variables_is_empty() {
        let config = with_env(&[], ClientConfig::from_env).expect("empty environment is valid");
        assert_eq!(config.base_url, None);
        assert_eq!(config.retry, None);
        assert_eq!(config.retry_count, None);
    }

    #[test]
    fn from_env_rejects_unparseable_value() {
        let err = with_env(&[("HOOKHTTP_RETRY_COUNT", "abc")], ClientConfig::from_env)
            .expect_err("non-numeric count must fail");
        assert!(err.contains("HOOKHTTP_RETRY_COUNT"));
        assert!(err.contains("abc"));
    }
}
