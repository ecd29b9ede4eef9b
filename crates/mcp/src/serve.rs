//! Serving tools over stdio (the server half of the protocol).

use std::future::Future;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{
    CallToolParams, CallToolResult, IncomingRequest, InitializeResult, JsonRpcError,
    JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, ServerCapabilities, ServerInfo, Tool,
    ToolsCapability,
};

/// Something that exposes tools to an MCP client.
pub trait ToolHandler: Send + Sync {
    /// Name and version reported during `initialize`.
    fn server_info(&self) -> ServerInfo;

    /// Tools reported by `tools/list`.
    fn tools(&self) -> Vec<Tool>;

    /// Run a tool. Failures are reported in-band with `is_error` set.
    fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> impl Future<Output = CallToolResult> + Send;
}

/// Serve `handler` on the process's stdin/stdout until stdin closes.
pub async fn serve_stdio<H: ToolHandler>(handler: &H) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(handler, stdin, stdout).await
}

/// Serve `handler` over newline-delimited JSON-RPC until `reader` hits EOF.
pub async fn serve<H, R, W>(handler: &H, mut reader: R, mut writer: W) -> Result<()>
where
    H: ToolHandler,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let info = handler.server_info();
    info!(server = %info.name, "serving MCP over stdio");

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            info!(server = %info.name, "client closed the connection");
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = dispatch(handler, &line).await {
            let json = serde_json::to_string(&response)?;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
}

/// Handle one incoming line; `None` for notifications.
pub async fn dispatch<H: ToolHandler>(handler: &H, line: &str) -> Option<JsonRpcResponse> {
    let request: IncomingRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable request");
            return Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::parse_error(e.to_string()),
            ));
        }
    };

    let Some(id) = request.id else {
        debug!(method = %request.method, "notification");
        return None;
    };

    debug!(method = %request.method, ?id, "request");
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability::default()),
                },
                server_info: handler.server_info(),
            },
        ),
        "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
        "tools/list" => JsonRpcResponse::success(
            id,
            ListToolsResult {
                tools: handler.tools(),
            },
        ),
        "tools/call" => {
            let params = request
                .params
                .map(serde_json::from_value::<CallToolParams>)
                .transpose();
            match params {
                Ok(Some(params)) => {
                    let result = handler.call_tool(&params.name, params.arguments).await;
                    JsonRpcResponse::success(id, result)
                }
                Ok(None) => JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::invalid_params("tools/call requires params"),
                ),
                Err(e) => JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::invalid_params(e.to_string()),
                ),
            }
        }
        other => JsonRpcResponse::failure(Some(id), JsonRpcError::method_not_found(other)),
    };
    Some(response)
}
