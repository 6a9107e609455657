//! Shared HTTP client wrapper
//!
//! Thin wrapper around `reqwest::Client` that centralizes USER_AGENT,
//! timeouts, auth headers and the connection retry policy.

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Request, Response, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::network::USER_AGENT;
use crate::config::retry::MAX_BACKOFF_MS;
use crate::error::{DifyError, Result};
use crate::settings::Settings;

/// HTTP client with the standard Dify configuration
pub struct HttpClient {
    inner: reqwest::Client,
    api_key: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpClient {
    /// Create a client from the given settings
    pub fn new(settings: &Settings) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            // Connections are released as soon as a call finishes.
            .pool_max_idle_per_host(0)
            .build()
            .map_err(DifyError::Client)?;

        Ok(Self {
            inner,
            api_key: settings.api_key.clone(),
            max_retries: settings.max_retries,
            retry_base_delay: settings.retry_base_delay,
        })
    }

    /// GET a URL with query parameters and return the body as text
    pub async fn get_text<Q: Serialize + ?Sized>(&self, url: Url, query: &Q) -> Result<String> {
        let request = self
            .inner
            .get(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bearer_auth(&self.api_key)
            .query(query)
            .build()
            .map_err(DifyError::Request)?;
        self.execute(request).await
    }

    /// POST a JSON body and return the response body as text
    pub async fn post_json_text<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<String> {
        let request = self
            .inner
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bearer_auth(&self.api_key)
            .json(body)
            .build()
            .map_err(DifyError::Request)?;
        self.execute(request).await
    }

    /// Send a request and read its body, mapping non-success statuses to errors
    async fn execute(&self, request: Request) -> Result<String> {
        let response = self.send_with_retry(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.ok();
            debug!(%status, "Dify API returned an error status");
            return Err(DifyError::Status { status, body });
        }

        response.text().await.map_err(DifyError::Body)
    }

    /// Send a request, retrying only failures to establish a connection
    ///
    /// A response with any status is returned as-is and never retried.
    async fn send_with_retry(&self, request: Request) -> Result<Response> {
        let mut retries = 0;
        loop {
            // Streaming bodies cannot be replayed; send those exactly once.
            let Some(attempt) = request.try_clone() else {
                return self.inner.execute(request).await.map_err(DifyError::Request);
            };
            debug!(method = %attempt.method(), url = %attempt.url(), retries, "Sending request");

            match self.inner.execute(attempt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && retries < self.max_retries => {
                    retries += 1;
                    let delay = self.backoff(retries);
                    warn!(error = %e, retries, ?delay, "Connection failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(DifyError::Request(e)),
            }
        }
    }

    /// Delay before the given retry (1-based)
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.retry_base_delay
            .saturating_mul(factor)
            .min(Duration::from_millis(MAX_BACKOFF_MS))
    }
}
