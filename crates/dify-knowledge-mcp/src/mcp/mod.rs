//! MCP stdio server
//!
//! Manual implementation of the Model Context Protocol over stdin/stdout:
//! initialize, ping, tools/list and tools/call.

pub mod server;
pub mod tools;
pub mod transport;
pub mod types;
