use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::ModelError;
use crate::catalog::FunctionSpec;
use crate::registry::ToolRegistry;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates the call with its result.
    pub id: String,
    pub function: FunctionCall,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Name and JSON-encoded arguments of a requested call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// What the bridge hands back to the model for one tool call.
///
/// `output` holds the tool's result, or an error message starting with
/// `Error:` when the call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub output: String,
}

/// One model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply asking for tool calls.
    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Trait for LLM clients driven by the bridge.
///
/// The client owns the conversation: it remembers what was said and which
/// calls are outstanding, so the bridge only passes the newest input.
pub trait ModelClient: Send {
    /// Replace the tools offered to the model.
    fn set_tools(&mut self, tools: Vec<FunctionSpec>, registry: Arc<ToolRegistry>);

    fn system_prompt(&self) -> Option<&str>;

    /// Read before every invocation.
    fn set_system_prompt(&mut self, prompt: Option<String>);

    /// Forget the conversation so far. Tools and system prompt stay.
    fn clear_history(&mut self);

    /// Send a user message.
    fn invoke_with_prompt(
        &mut self,
        prompt: &str,
    ) -> impl Future<Output = Result<ModelReply, ModelError>> + Send;

    /// Send the results of the previous reply's tool calls.
    fn invoke(
        &mut self,
        results: Vec<ToolCallResult>,
    ) -> impl Future<Output = Result<ModelReply, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_kinds() {
        assert!(!ModelReply::text("done").is_tool_call());
        let reply = ModelReply::calls(vec![ToolCallRequest::new("1", "ping", "{}")]);
        assert!(reply.is_tool_call());
        assert_eq!(reply.tool_calls[0].function.name, "ping");
    }

    #[test]
    fn tool_call_wire_shape() {
        let call: ToolCallRequest = serde_json::from_str(
            r#"{"id":"call_1","function":{"name":"query-fhir","arguments":"{\"a\":1}"}}"#,
        )
        .unwrap();
        assert_eq!(call, ToolCallRequest::new("call_1", "query-fhir", r#"{"a":1}"#));
    }
}
