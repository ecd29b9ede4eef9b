//! Tool providers: where tool calls are actually executed.

pub mod errors;
mod mcp_host;

pub use errors::ProviderError;
pub use mcp_host::McpProvider;

use std::future::Future;

use serde_json::{Map, Value};

use crate::catalog::ToolDescriptor;

/// What a tool returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// Text as-is, anything else serialized as JSON.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

/// Trait for remote tool providers.
///
/// This is the boundary between the bridge loop and side effects.
pub trait ToolProvider: Send + Sync {
    /// Establish the session. Connecting twice is a no-op.
    fn connect(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Fetch the tools the provider currently offers.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolDescriptor>, ProviderError>> + Send;

    /// Invoke a tool by name.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = Result<ToolOutput, ProviderError>> + Send;

    /// Release the session. Safe to call more than once.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_text_is_verbatim() {
        assert_eq!(ToolOutput::Text("{ \"a\": 1 }".into()).into_text(), "{ \"a\": 1 }");
        assert_eq!(
            ToolOutput::Json(serde_json::json!({"a": [1, 2]})).into_text(),
            r#"{"a":[1,2]}"#
        );
    }
}
