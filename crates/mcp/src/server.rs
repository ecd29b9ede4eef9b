//! MCP server management (spawn, communicate, lifecycle).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, ServerMessage, Tool,
};

/// Default timeout for handshake and listing requests.
///
/// `tools/call` is not bounded here; callers race it against their own
/// deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum output size (1MB).
/// Sized for large tool outputs (bundles of FHIR resources, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Configuration for an MCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Handle to a running MCP server.
pub struct Server {
    config: ServerConfig,
    process: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
    next_id: AtomicI64,
    initialized: Mutex<bool>,
    tools: Mutex<Vec<Tool>>,
}

impl Server {
    /// Spawn a new MCP server process.
    pub async fn spawn(config: ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        info!(server = %config.name, command = %config.command, "spawned MCP server");

        Ok(Self {
            config,
            process: Mutex::new(process),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicI64::new(1),
            initialized: Mutex::new(false),
            tools: Mutex::new(Vec::new()),
        })
    }

    /// Initialize the server (must be called before other operations).
    pub async fn initialize(&self) -> Result<&Self> {
        let params = InitializeParams::default();
        let result: InitializeResult = self
            .request("initialize", Some(params), Some(DEFAULT_TIMEOUT))
            .await?;

        self.notify("notifications/initialized", None::<()>).await?;

        info!(
            server = %self.config.name,
            remote = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );

        *self.initialized.lock().await = true;

        self.refresh_tools().await?;

        Ok(self)
    }

    /// Refresh the list of available tools.
    pub async fn refresh_tools(&self) -> Result<()> {
        let result: ListToolsResult = self
            .request("tools/list", None::<()>, Some(DEFAULT_TIMEOUT))
            .await?;
        debug!(server = %self.config.name, count = result.tools.len(), "listed tools");
        *self.tools.lock().await = result.tools;
        Ok(())
    }

    /// Get the list of available tools.
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.lock().await.clone()
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` by the server is turned into
    /// [`Error::ToolCallFailed`] carrying the server's text.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResult> {
        if !*self.initialized.lock().await {
            return Err(Error::NotInitialized);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params), None).await?;

        if result.is_error {
            let error_text = result
                .content
                .iter()
                .filter_map(|c| c.as_text())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::ToolCallFailed(error_text));
        }

        Ok(result)
    }

    /// Stop the server process. MCP has no shutdown message over stdio;
    /// the server is simply killed.
    pub async fn shutdown(self) {
        let mut process = self.process.lock().await;
        if let Err(e) = process.kill().await {
            warn!(server = %self.config.name, error = %e, "failed to kill MCP server");
        }

        info!(server = %self.config.name, "MCP server stopped");
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        limit: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        let request_json = serde_json::to_string(&request)?;
        debug!(server = %self.config.name, %method, ?id, "sending request");
        self.write_line(&request_json).await?;

        let response = match limit {
            Some(limit) => timeout(limit, self.read_response(&id))
                .await
                .map_err(|_| Error::Timeout {
                    method: method.to_string(),
                })??,
            None => self.read_response(&id).await?,
        };

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }

    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: serde::Serialize,
    {
        // Notifications have no ID
        let mut notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        if let Some(p) = params {
            notification["params"] = serde_json::to_value(p)?;
        }

        let notification_json = serde_json::to_string(&notification)?;
        self.write_line(&notification_json).await
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read lines until the response for `id` arrives.
    ///
    /// Notifications and responses to abandoned requests (a caller that gave
    /// up on a `tools/call` drops its future, but the server still answers)
    /// are skipped.
    async fn read_response(&self, id: &RequestId) -> Result<JsonRpcResponse> {
        let mut stdout = self.stdout.lock().await;
        loop {
            let mut line = String::new();

            let bytes_read = stdout.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Err(Error::ServerExited);
            }

            if line.len() > MAX_OUTPUT_SIZE {
                return Err(Error::OutputTooLarge {
                    size: line.len(),
                    max: MAX_OUTPUT_SIZE,
                });
            }

            if line.trim().is_empty() {
                continue;
            }

            // A read cancelled mid-line leaves a fragment behind; skip it.
            let message = match ServerMessage::parse(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(server = %self.config.name, error = %e, "skipping unparseable line");
                    continue;
                }
            };
            match message {
                ServerMessage::Notification { method } => {
                    debug!(server = %self.config.name, %method, "ignoring server message");
                }
                ServerMessage::Response(response) if response.id.as_ref() == Some(id) => {
                    return Ok(response);
                }
                ServerMessage::Response(response) => {
                    warn!(
                        server = %self.config.name,
                        expected = ?id,
                        got = ?response.id,
                        "discarding response to an abandoned request"
                    );
                }
            }
        }
    }
}
