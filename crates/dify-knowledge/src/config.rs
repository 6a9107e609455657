//! Configuration constants for the Dify knowledge client

/// Dify API defaults
pub mod api {
    /// Environment variable holding the API base URL
    pub const API_URL_ENV: &str = "DIFY_API_URL";

    /// Environment variable holding the bearer token
    pub const API_KEY_ENV: &str = "DIFY_API_KEY";

    /// Base URL used when `DIFY_API_URL` is unset
    pub const DEFAULT_API_URL: &str = "https://api.dify.ai/v1";

    /// Placeholder key used when `DIFY_API_KEY` is unset
    pub const DEFAULT_API_KEY: &str = "your_api_key_here";
}

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("dify-knowledge/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Whole-request timeout in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Connection retry policy
pub mod retry {
    /// Retries of connection failures after the first attempt
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay between retries in milliseconds (exponential backoff: 2^n * base)
    pub const RETRY_BASE_DELAY_MS: u64 = 250;

    /// Maximum backoff delay in milliseconds
    pub const MAX_BACKOFF_MS: u64 = 2_000;
}

/// Reply formatting
pub mod reply {
    /// Characters of an error response body quoted back to the caller
    pub const ERROR_BODY_PREVIEW_CHARS: usize = 200;

    /// Stand-in when an error response body could not be read
    pub const MISSING_BODY: &str = "N/A";
}
