//! Network operations
//!
//! HTTP transport shared by every Dify call.

pub mod client;

// Re-export commonly used types
pub use client::HttpClient;
