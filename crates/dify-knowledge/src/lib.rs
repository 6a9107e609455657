//! Dify knowledge-base API client
//!
//! Settings, HTTP transport and the two Dify dataset calls used by the
//! MCP server.
//!
//! ## Quick start
//!
//! ```no_run
//! use dify_knowledge::knowledge::{DifyClient, ListKnowledgeParams};
//! use dify_knowledge::settings::Settings;
//!
//! # async fn demo() -> dify_knowledge::error::Result<()> {
//! let client = DifyClient::new(Settings::from_env())?;
//! let body = client.list_datasets(&ListKnowledgeParams::default()).await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod knowledge;
pub mod network;
pub mod settings;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
