//! MCP-backed tool provider.

use std::sync::Arc;

use mcp::{Server, ServerConfig};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::info;

use super::{ProviderError, ToolOutput, ToolProvider};
use crate::catalog::ToolDescriptor;

/// Tool provider backed by one MCP server process.
///
/// The process is spawned on [`connect`](ToolProvider::connect) and killed on
/// [`close`](ToolProvider::close) or when the provider is dropped.
pub struct McpProvider {
    config: ServerConfig,
    server: Mutex<Option<Arc<Server>>>,
}

impl McpProvider {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            server: Mutex::new(None),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.config.name
    }

    async fn connected(&self) -> Result<Arc<Server>, ProviderError> {
        self.server
            .lock()
            .await
            .clone()
            .ok_or(ProviderError::NotConnected)
    }
}

impl ToolProvider for McpProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        let mut slot = self.server.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let name = self.config.name.clone();
        let connect_err = |source| ProviderError::Connect {
            server: name.clone(),
            source,
        };
        let server = Server::spawn(self.config.clone())
            .await
            .map_err(connect_err)?;
        server.initialize().await.map_err(connect_err)?;

        info!(server = %self.config.name, "connected to tool server");
        *slot = Some(Arc::new(server));
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let server = self.connected().await?;
        server.refresh_tools().await?;
        Ok(server
            .tools()
            .await
            .into_iter()
            .map(ToolDescriptor::from)
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ProviderError> {
        let server = self.connected().await?;
        let result = server.call_tool(name, Some(Value::Object(arguments))).await?;

        match result.joined_text() {
            Some(text) => Ok(ToolOutput::Text(text)),
            None => Ok(ToolOutput::Json(serde_json::to_value(&result.content)?)),
        }
    }

    async fn close(&self) {
        let Some(server) = self.server.lock().await.take() else {
            return;
        };
        match Arc::try_unwrap(server) {
            Ok(server) => server.shutdown().await,
            // Still referenced by an in-flight call; the process is killed
            // when the last handle drops.
            Err(_) => info!(server = %self.config.name, "tool server released"),
        }
    }
}
