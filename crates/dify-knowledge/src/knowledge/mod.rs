//! Dify knowledge-base API
//!
//! Dataset listing and retrieval against a single Dify endpoint.

pub mod client;
pub mod types;

// Re-exports
pub use client::DifyClient;
pub use types::{ListKnowledgeParams, QueryKnowledgeParams};
