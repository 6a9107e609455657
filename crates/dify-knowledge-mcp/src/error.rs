//! Error types for the MCP server

use dify_knowledge::error::DifyError;
use thiserror::Error;

use crate::mcp::types::{INTERNAL_ERROR, INVALID_PARAMS};

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur in the MCP server
#[derive(Debug, Error)]
pub enum McpError {
    /// Requested tool is not in the catalog
    #[error("Tool '{0}' not found.")]
    UnknownTool(String),

    /// A tool argument is missing or has the wrong type
    #[error("Invalid parameter '{field}': {message}")]
    Validation { field: String, message: String },

    /// Malformed request params (outside of tool arguments)
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Dify API failure that is not turned into a text reply
    #[error(transparent)]
    Upstream(#[from] DifyError),

    /// IO error (stdin/stdout)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        McpError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convert error to JSON-RPC error code
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::UnknownTool(_) | McpError::Validation { .. } | McpError::InvalidParams(_) => {
                INVALID_PARAMS
            }
            _ => INTERNAL_ERROR,
        }
    }
}
