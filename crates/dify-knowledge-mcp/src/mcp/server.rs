//! MCP stdio server
//!
//! Reads JSON-RPC requests from the input channel, dispatches to handlers,
//! writes responses to the output. One request is handled at a time.

use std::collections::VecDeque;

use serde_json::{json, Value};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dify_knowledge::knowledge::DifyClient;

use crate::error::{McpError, McpResult};

use super::tools;
use super::transport::write_message;
use super::types::{
    InitializeParams, JsonRpcRequest, JsonRpcResponse, ToolCallParams, METHOD_NOT_FOUND,
    PARSE_ERROR,
};

const SERVER_NAME: &str = "dify-knowledge";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol versions we can speak, oldest first
const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];
const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// MCP server state: the immutable Dify client
pub struct McpServer {
    client: DifyClient,
}

impl McpServer {
    pub fn new(client: DifyClient) -> Self {
        Self { client }
    }

    /// Handle one request; `None` for notifications
    pub async fn handle_request(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = req.id.clone() else {
            debug!(method = %req.method, "Notification received");
            return None;
        };

        let response = match req.method.as_str() {
            "initialize" => handle_initialize(id, &req.params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, &req.params).await,
            _ => {
                warn!(method = %req.method, "Unknown method");
                JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", req.method),
                )
            }
        };
        Some(response)
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let call_params: ToolCallParams = match serde_json::from_value(params.clone()) {
            Ok(p) => p,
            Err(e) => return error_response(id, McpError::InvalidParams(e.to_string())),
        };

        info!(tool = %call_params.name, "Tool call");
        match tools::call_tool(&self.client, &call_params.name, &call_params.arguments).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(v) => JsonRpcResponse::success(id, v),
                Err(e) => error_response(id, e.into()),
            },
            Err(e) => {
                warn!(tool = %call_params.name, error = %e, "Tool call failed");
                error_response(id, e)
            }
        }
    }
}

fn error_response(id: Value, err: McpError) -> JsonRpcResponse {
    JsonRpcResponse::error(id, err.error_code(), err.to_string())
}

fn handle_initialize(id: Value, params: &Value) -> JsonRpcResponse {
    let params: InitializeParams = serde_json::from_value(params.clone()).unwrap_or_default();
    let protocol_version = SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|v| *v == params.protocol_version)
        .unwrap_or(LATEST_PROTOCOL_VERSION);
    info!(requested = %params.protocol_version, protocol_version, "Client initialized");

    JsonRpcResponse::success(
        id,
        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }),
    )
}

fn handle_tools_list(id: Value) -> JsonRpcResponse {
    let tool_defs = tools::list_tools();
    JsonRpcResponse::success(id, json!({ "tools": tool_defs }))
}

/// Run the server loop until the input channel closes
///
/// If input closes while a request is being handled, the request is
/// abandoned (its HTTP call is dropped) and no response is written.
pub async fn serve<W>(
    server: &McpServer,
    mut lines: mpsc::Receiver<String>,
    writer: &mut W,
) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    // Lines that arrived while a call was in flight
    let mut backlog = VecDeque::new();

    loop {
        let line = match backlog.pop_front() {
            Some(line) => line,
            None => match lines.recv().await {
                Some(line) => line,
                None => {
                    info!("EOF received, shutting down");
                    return Ok(());
                }
            },
        };
        debug!(%line, "Received");

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC request");
                let resp = JsonRpcResponse::error(Value::Null, PARSE_ERROR, e.to_string());
                write_message(writer, &resp).await?;
                continue;
            }
        };

        let handling = server.handle_request(&request);
        tokio::pin!(handling);
        let response = loop {
            tokio::select! {
                // A finished request wins over input closure.
                biased;
                response = &mut handling => break response,
                next = lines.recv() => match next {
                    Some(line) => backlog.push_back(line),
                    None => {
                        info!(method = %request.method, "Input closed mid-request, abandoning it");
                        return Ok(());
                    }
                },
            }
        };

        if let Some(response) = response {
            write_message(writer, &response).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dify_knowledge::settings::Settings;
    use dify_knowledge::testing::MockUpstream;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn server_for(url: &str) -> McpServer {
        let settings = Settings::new(url, "key").with_retries(0, Duration::ZERO);
        McpServer::new(DifyClient::new(settings).unwrap())
    }

    /// Feed `input` lines through `serve` and collect `expected` responses
    ///
    /// Input stays open until the responses have arrived, since closing it
    /// would abandon an in-flight call.
    async fn run_lines(server: &McpServer, input: &[&str], expected: usize) -> Vec<Value> {
        let (tx, rx) = mpsc::channel(16);
        let (mut server_end, client_end) = tokio::io::duplex(64 * 1024);

        let driver = async move {
            for line in input {
                tx.send(line.to_string()).await.unwrap();
            }
            let mut reader = BufReader::new(client_end).lines();
            let mut out = Vec::new();
            while out.len() < expected {
                let line = reader.next_line().await.unwrap().expect("output ended early");
                out.push(serde_json::from_str(&line).unwrap());
            }
            drop(tx);
            out
        };

        let (result, out) = tokio::join!(serve(server, rx, &mut server_end), driver);
        result.unwrap();
        out
    }

    fn call(id: u64, name: &str, arguments: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_initialize_echoes_supported_version() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(
            &server,
            &[r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#],
            1,
        )
        .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 1);
        assert_eq!(out[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(out[0]["result"]["serverInfo"]["name"], "dify-knowledge");
        assert!(out[0]["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_unknown_version_offers_latest() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(
            &server,
            &[r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#],
            1,
        )
        .await;
        assert_eq!(out[0]["result"]["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(
            &server,
            &[
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#,
            ],
            1,
        )
        .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], "p");
        assert_eq!(out[0]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_then_continue() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(
            &server,
            &["{not json", r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#],
            2,
        )
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], Value::Null);
        assert_eq!(out[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(out[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(&server, &[r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#], 1).await;
        assert_eq!(out[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(&server, &[r#"{"jsonrpc":"2.0","id":4,"method":"tools/list"}"#], 1).await;

        let tools = out[0]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "list_knowledge");
        assert_eq!(tools[1]["name"], "query_knowledge");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error_without_http() {
        let upstream = MockUpstream::respond(200, "{}");
        let server = server_for(&upstream.url());
        let out = run_lines(&server, &[&call(5, "not_a_tool", json!({}))], 1).await;

        assert_eq!(out[0]["error"]["code"], -32602);
        assert_eq!(out[0]["error"]["message"], "Tool 'not_a_tool' not found.");
        assert!(out[0].get("result").is_none());
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_is_protocol_error_without_http() {
        let upstream = MockUpstream::respond(200, "{}");
        let server = server_for(&upstream.url());
        let out = run_lines(&server, &[&call(6, "query_knowledge", json!({ "id": "ds" }))], 1).await;

        assert_eq!(out[0]["error"]["code"], -32602);
        assert!(out[0]["error"]["message"].as_str().unwrap().contains("'query'"));
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_query_http_error_is_text_reply() {
        let upstream = MockUpstream::respond(500, "server error");
        let server = server_for(&upstream.url());
        let out = run_lines(
            &server,
            &[&call(7, "query_knowledge", json!({ "id": "ds", "query": "q" }))],
            1,
        )
        .await;

        let content = &out[0]["result"]["content"];
        assert_eq!(content.as_array().unwrap().len(), 1);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(
            content[0]["text"],
            "Dify API HTTP Error: 500. Response: server error"
        );
    }

    #[tokio::test]
    async fn test_list_http_error_is_protocol_error() {
        let upstream = MockUpstream::respond(500, "server error");
        let server = server_for(&upstream.url());
        let out = run_lines(&server, &[&call(8, "list_knowledge", json!({}))], 1).await;

        assert!(out[0].get("result").is_none());
        assert_eq!(out[0]["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn test_list_success_passthrough() {
        let raw = r#"{"data":[{"id":"ds-1","name":"Docs"}],"has_more":false,"limit":20,"total":1,"page":1}"#;
        let upstream = MockUpstream::respond(200, raw);
        let server = server_for(&upstream.url());
        let out = run_lines(&server, &[&call(9, "list_knowledge", json!({ "keyword": "Docs" }))], 1).await;

        assert_eq!(out[0]["result"]["content"][0]["text"], raw);
        assert_eq!(upstream.requests()[0].query(), Some("keyword=Docs"));
    }

    #[tokio::test]
    async fn test_malformed_tools_call_params() {
        let server = server_for("http://127.0.0.1:9/v1");
        let out = run_lines(
            &server,
            &[r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"arguments":{}}}"#],
            1,
        )
        .await;
        assert_eq!(out[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_input_closed_mid_call_abandons_request() {
        // Accepts connections (kernel backlog) but never answers.
        let silent = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let url = format!("http://{}/v1", silent.local_addr().unwrap());
        let server = server_for(&url);

        let (tx, rx) = mpsc::channel(4);
        tx.send(call(11, "query_knowledge", json!({ "id": "a", "query": "b" })))
            .await
            .unwrap();

        let mut out = Vec::new();
        let serving = serve(&server, rx, &mut out);
        let closer = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(tx);
        };
        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(serving, closer)
        })
        .await
        .expect("serve should return once input closes");

        assert!(result.is_ok());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_reply_written_when_input_closes_right_after_request() {
        let server = server_for("http://127.0.0.1:9/v1");

        for round in 0..50 {
            let (tx, rx) = mpsc::channel(4);
            tx.send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string())
                .await
                .unwrap();
            drop(tx);

            let mut out = Vec::new();
            serve(&server, rx, &mut out).await.unwrap();

            let text = String::from_utf8(out).unwrap();
            assert_eq!(text.lines().count(), 1, "round {round}");
            let reply: Value = serde_json::from_str(text.trim_end()).unwrap();
            assert_eq!(reply["id"], 1);
            assert_eq!(reply["result"], json!({}));
        }
    }

    #[tokio::test]
    async fn test_lines_during_call_are_processed_in_order() {
        let upstream = MockUpstream::respond(200, "[]");
        let server = server_for(&upstream.url());
        let out = run_lines(
            &server,
            &[
                &call(12, "list_knowledge", json!({})),
                r#"{"jsonrpc":"2.0","id":13,"method":"ping"}"#,
                r#"{"jsonrpc":"2.0","id":14,"method":"tools/list"}"#,
            ],
            3,
        )
        .await;

        let ids: Vec<_> = out.iter().map(|v| v["id"].clone()).collect();
        assert_eq!(ids, vec![json!(12), json!(13), json!(14)]);
    }
}
