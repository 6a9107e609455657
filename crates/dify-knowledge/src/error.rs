//! Error types for the Dify knowledge client
//!
//! Centralized error handling using thiserror.

pub use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to the Dify API
#[derive(Error, Debug)]
pub enum DifyError {
    /// The request never produced a response (DNS, refused, timeout)
    #[error("{}", friendly_network_error(.0))]
    Request(#[source] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Dify API returned HTTP {status}")]
    Status {
        status: StatusCode,
        /// Response body, if it could be read
        body: Option<String>,
    },

    /// A successful response whose body could not be read (stall, reset,
    /// timeout mid-body)
    #[error("Failed to read response body: {}", friendly_network_error(.0))]
    Body(#[source] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl DifyError {
    /// True for network failures, whether before the response or while
    /// reading its body
    pub fn is_transport(&self) -> bool {
        matches!(self, DifyError::Request(_) | DifyError::Body(_))
    }
}

/// Result type alias for the Dify knowledge client
pub type Result<T> = std::result::Result<T, DifyError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_timeout() {
        return match e.url() {
            Some(url) => format!("Request to {url} timed out"),
            None => "Request timed out".to_string(),
        };
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!(
                "Could not connect to {}",
                url.host_str().unwrap_or("server")
            );
        }
        return "Could not connect to server".to_string();
    }
    format!("Network error: {e}")
}
