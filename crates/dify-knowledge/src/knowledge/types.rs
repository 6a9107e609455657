//! Parameters of the two knowledge calls
//!
//! Serialized straight into the outbound request: list parameters become the
//! query string, query parameters (minus `id`) become the JSON body.

use serde::Serialize;

/// Parameters for listing knowledge bases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListKnowledgeParams {
    /// Keyword to filter knowledge bases; omitted from the query when empty
    #[serde(skip_serializing_if = "String::is_empty")]
    pub keyword: String,
}

impl ListKnowledgeParams {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }
}

/// Parameters for querying one knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryKnowledgeParams {
    /// Knowledge base ID; goes into the request path, never the body
    #[serde(skip_serializing)]
    pub id: String,

    /// Query to search in the knowledge base
    pub query: String,
}

impl QueryKnowledgeParams {
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
        }
    }
}
