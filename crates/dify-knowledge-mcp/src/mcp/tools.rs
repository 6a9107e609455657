//! MCP tool definitions and handlers
//!
//! Arguments are validated into a `ToolCall` before any HTTP request is made.
//! List failures propagate to the caller as protocol errors; query failures
//! come back as ordinary text.

use serde_json::{json, Value};
use tracing::{debug, warn};

use dify_knowledge::config::reply::{ERROR_BODY_PREVIEW_CHARS, MISSING_BODY};
use dify_knowledge::error::DifyError;
use dify_knowledge::knowledge::{DifyClient, ListKnowledgeParams, QueryKnowledgeParams};

use crate::error::{McpError, McpResult};

use super::types::{ToolDefinition, ToolResult};

pub const LIST_KNOWLEDGE: &str = "list_knowledge";
pub const QUERY_KNOWLEDGE: &str = "query_knowledge";

/// Return all tool definitions for tools/list
pub fn list_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: LIST_KNOWLEDGE,
            description: "List all knowledge bases.",
            input_schema: json!({
                "type": "object",
                "title": "ListKnowledgeParams",
                "properties": {
                    "keyword": {
                        "type": "string",
                        "title": "Keyword",
                        "default": "",
                        "description": "Keyword to filter knowledge bases."
                    }
                }
            }),
        },
        ToolDefinition {
            name: QUERY_KNOWLEDGE,
            description: "Query a specific knowledge base.",
            input_schema: json!({
                "type": "object",
                "title": "QueryKnowledgeParams",
                "properties": {
                    "id": {
                        "type": "string",
                        "title": "Id",
                        "description": "ID of the knowledge base to query."
                    },
                    "query": {
                        "type": "string",
                        "title": "Query",
                        "description": "Query to search in the knowledge base."
                    }
                },
                "required": ["id", "query"]
            }),
        },
    ]
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ListKnowledge(ListKnowledgeParams),
    QueryKnowledge(QueryKnowledgeParams),
}

impl ToolCall {
    /// Match the tool name and validate its arguments
    pub fn parse(name: &str, args: &Value) -> McpResult<Self> {
        match name {
            LIST_KNOWLEDGE => Ok(ToolCall::ListKnowledge(ListKnowledgeParams {
                keyword: optional_str(args, "keyword", "")?,
            })),
            QUERY_KNOWLEDGE => Ok(ToolCall::QueryKnowledge(QueryKnowledgeParams {
                id: required_str(args, "id")?,
                query: required_str(args, "query")?,
            })),
            _ => Err(McpError::UnknownTool(name.to_string())),
        }
    }
}

/// Dispatch a tool call to the appropriate handler
pub async fn call_tool(client: &DifyClient, name: &str, args: &Value) -> McpResult<ToolResult> {
    let call = ToolCall::parse(name, args)?;
    debug!(?call, "Dispatching tool call");
    match call {
        ToolCall::ListKnowledge(params) => list_knowledge(client, &params).await,
        ToolCall::QueryKnowledge(params) => Ok(query_knowledge(client, &params).await),
    }
}

async fn list_knowledge(client: &DifyClient, params: &ListKnowledgeParams) -> McpResult<ToolResult> {
    let body = client.list_datasets(params).await?;
    Ok(ToolResult::text(body))
}

async fn query_knowledge(client: &DifyClient, params: &QueryKnowledgeParams) -> ToolResult {
    match client.retrieve(params).await {
        Ok(body) => ToolResult::text(body),
        Err(e) => {
            warn!(error = %e, id = %params.id, "Knowledge query failed");
            ToolResult::text(describe_query_failure(&e))
        }
    }
}

/// Render a failed query as the text the calling agent will read
pub fn describe_query_failure(err: &DifyError) -> String {
    match err {
        DifyError::Status { status, body } => {
            let summary = body
                .as_deref()
                .map(|b| b.chars().take(ERROR_BODY_PREVIEW_CHARS).collect::<String>())
                .unwrap_or_else(|| MISSING_BODY.to_string());
            format!(
                "Dify API HTTP Error: {}. Response: {summary}",
                status.as_u16()
            )
        }
        DifyError::Request(_) | DifyError::Body(_) => format!("Dify API Request Error: {err}"),
        _ => format!("Querying Dify API encountered an unexpected error: {err}"),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Look up a field in the argument bag; `null` arguments count as empty
fn field<'a>(args: &'a Value, name: &str) -> McpResult<Option<&'a Value>> {
    match args {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(map.get(name)),
        other => Err(McpError::validation(
            "arguments",
            format!("expected an object, got {}", type_name(other)),
        )),
    }
}

fn required_str(args: &Value, name: &str) -> McpResult<String> {
    match field(args, name)? {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(McpError::validation(
            name,
            format!("expected a string, got {}", type_name(other)),
        )),
        None => Err(McpError::validation(name, "missing required parameter")),
    }
}

/// Optional string; only an absent field takes the default
fn optional_str(args: &Value, name: &str, default: &str) -> McpResult<String> {
    match field(args, name)? {
        Some(Value::String(s)) => Ok(s.clone()),
        None => Ok(default.to_string()),
        Some(other) => Err(McpError::validation(
            name,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
