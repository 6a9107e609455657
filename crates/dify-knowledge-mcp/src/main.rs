//! Dify knowledge MCP server
//!
//! Exposes `list_knowledge` and `query_knowledge` to MCP hosts over stdio
//! and forwards each call to the Dify dataset API.

mod error;
mod mcp;

use std::io::BufReader;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use dify_knowledge::config::api::{API_KEY_ENV, API_URL_ENV, DEFAULT_API_KEY, DEFAULT_API_URL};
use dify_knowledge::knowledge::DifyClient;
use dify_knowledge::settings::Settings;

use error::McpResult;
use mcp::server::{serve, McpServer};
use mcp::transport;

/// Dify knowledge base MCP server (stdio)
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Base URL of the Dify API
    #[arg(long, env = API_URL_ENV, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Dify dataset API key
    #[arg(
        long,
        env = API_KEY_ENV,
        default_value = DEFAULT_API_KEY,
        hide_env_values = true,
        hide_default_value = true
    )]
    api_key: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Log to stderr, stdout is for JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::select! {
        result = run(args) => match result {
            Ok(()) => {
                info!("Dify knowledge MCP server stopped");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Server failed");
                eprintln!("An error occurred: {e}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Server shutting down...");
            ExitCode::SUCCESS
        }
    }
}

async fn run(args: Args) -> McpResult<()> {
    let settings = Settings::new(args.api_url, args.api_key);
    if settings.has_placeholder_key() {
        warn!("{API_KEY_ENV} is not set; requests will carry a placeholder key");
    }
    info!(api_url = %settings.api_url, "Starting Dify knowledge MCP server");

    let server = McpServer::new(DifyClient::new(settings)?);
    let lines = transport::spawn_reader(BufReader::new(std::io::stdin()))?;
    let mut stdout = tokio::io::stdout();

    serve(&server, lines, &mut stdout).await
}
