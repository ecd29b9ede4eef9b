//! MCP (Model Context Protocol) over stdio.
//!
//! This crate provides both halves of the newline-delimited JSON-RPC
//! transport: a client for spawning and talking to MCP servers, and a small
//! serving loop for exposing tools from a Rust binary.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Server, ServerConfig};
//! use std::collections::HashMap;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig {
//!     name: "fhir".to_string(),
//!     command: "fhir-mcp".to_string(),
//!     args: vec![],
//!     env: HashMap::new(),
//! };
//!
//! let server = Server::spawn(config).await?;
//! server.initialize().await?;
//!
//! let tools = server.tools().await;
//! for tool in tools {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = server.call_tool("query-fhir", Some(serde_json::json!({
//!     "searchParams": { "from": "Patient", "where": { "id": "example" } },
//!     "authToken": "token"
//! }))).await?;
//!
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod serve;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, IncomingRequest, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, ServerMessage, Tool, ToolContent, ToolsCapability,
};
pub use serve::{ToolHandler, dispatch, serve, serve_stdio};
pub use server::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, Server, ServerConfig};
