//! Runtime settings
//!
//! Loaded once at startup and shared read-only by every call.

use std::time::Duration;

use crate::config::api::{API_KEY_ENV, API_URL_ENV, DEFAULT_API_KEY, DEFAULT_API_URL};
use crate::config::network::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use crate::config::retry::{MAX_RETRIES, RETRY_BASE_DELAY_MS};

/// Connection settings for the Dify API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL, e.g. `https://api.dify.ai/v1`
    pub api_url: String,

    /// Bearer token sent with every request
    pub api_key: String,

    /// Whole-request timeout
    pub request_timeout: Duration,

    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,

    /// Retries of connection failures after the first attempt
    pub max_retries: u32,

    /// First backoff delay; doubles with each retry
    pub retry_base_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl Settings {
    /// Default settings for the given endpoint and key
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read `DIFY_API_URL` and `DIFY_API_KEY`, falling back to placeholders
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(
            lookup(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            lookup(API_KEY_ENV).unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
        )
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the connection retry policy
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// `true` when the key is still the built-in placeholder
    pub fn has_placeholder_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}
