//! Executes model-issued tool calls against a provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::model::{ToolCallRequest, ToolCallResult};
use crate::provider::{ProviderError, ToolProvider};
use crate::registry::ToolRegistry;

/// How long a single tool call may take.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a tool call produced no output.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("MCP call timed out after {}", seconds(.after))]
    Timeout { tool: String, after: Duration },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// "30 seconds", "1 second", "0.5 seconds".
fn seconds(after: &Duration) -> String {
    if *after == Duration::from_secs(1) {
        "1 second".to_string()
    } else {
        format!("{} seconds", after.as_secs_f64())
    }
}

/// Runs tool calls one at a time, each bounded by a timeout unless the
/// timeout is disabled.
///
/// Failures never escape: every call yields a [`ToolCallResult`], with an
/// `Error: ...` output when something went wrong.
pub struct ToolExecutor<P> {
    provider: Arc<P>,
    timeout: Option<Duration>,
}

impl<P: ToolProvider> ToolExecutor<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
        }
    }

    /// `None` lets calls run for as long as the server takes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute calls sequentially, returning one result per call in order.
    pub async fn execute_all(
        &self,
        calls: &[ToolCallRequest],
        registry: &ToolRegistry,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call, registry).await);
        }
        results
    }

    /// Execute one call.
    pub async fn execute(&self, call: &ToolCallRequest, registry: &ToolRegistry) -> ToolCallResult {
        let name = &call.function.name;
        if !registry.contains(name) {
            warn!(tool = %name, "model called a tool that is not registered");
        }

        let output = match self.run(call).await {
            Ok(output) => {
                info!(tool = %name, call_id = %call.id, "tool call succeeded");
                debug!(tool = %name, %output, "tool result");
                output
            }
            Err(e) => {
                error!(tool = %name, call_id = %call.id, error = %e, "tool call failed");
                format!("Error: {e}")
            }
        };

        ToolCallResult {
            tool_call_id: call.id.clone(),
            output,
        }
    }

    async fn run(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let name = &call.function.name;
        let arguments = parse_arguments(name, &call.function.arguments)?;
        let shown = Value::Object(arguments.clone());
        debug!(tool = %name, arguments = %shown, "calling tool");

        let pending = self.provider.call_tool(name, arguments);
        let Some(limit) = self.timeout else {
            return Ok(pending.await?.into_text());
        };

        // Dropping the call future on timeout abandons the request; the MCP
        // client discards the late response when it arrives.
        let output = tokio::time::timeout(limit, pending)
            .await
            .map_err(|_| ToolError::Timeout {
                tool: name.clone(),
                after: limit,
            })??;

        Ok(output.into_text())
    }
}

/// Arguments must decode to a JSON object; an empty string means no
/// arguments.
fn parse_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason,
    };

    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw).map_err(|e| invalid(e.to_string()))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(invalid(format!("expected a JSON object, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolDescriptor;
    use crate::provider::ToolOutput;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Succeeds with the arguments echoed back, except for listed failures,
    /// tools named `hang`, and `slow`, which answers after a minute.
    #[derive(Default)]
    struct FakeProvider {
        failing: HashSet<String>,
        seen: Mutex<Vec<String>>,
    }

    impl ToolProvider for FakeProvider {
        async fn connect(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Map<String, Value>,
        ) -> Result<ToolOutput, ProviderError> {
            self.seen.lock().unwrap().push(name.to_string());
            if name == "hang" {
                std::future::pending::<()>().await;
            }
            if name == "slow" {
                tokio::time::sleep(Duration::from_secs(60)).await;
                return Ok(ToolOutput::Text("worth the wait".into()));
            }
            if self.failing.contains(name) {
                return Err(ProviderError::Mcp(mcp::Error::ToolCallFailed(format!(
                    "{name} exploded"
                ))));
            }
            if name == "text" {
                return Ok(ToolOutput::Text("plain words".into()));
            }
            Ok(ToolOutput::Json(Value::Object(arguments)))
        }

        async fn close(&self) {}
    }

    fn executor(provider: FakeProvider) -> ToolExecutor<FakeProvider> {
        ToolExecutor::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn success_output_is_serialized_json() {
        let exec = executor(FakeProvider::default());
        let result = exec
            .execute(&ToolCallRequest::new("c1", "echo", r#"{"b":2}"#), &ToolRegistry::new())
            .await;
        assert_eq!(result.tool_call_id, "c1");
        assert_eq!(result.output, r#"{"b":2}"#);
    }

    #[tokio::test]
    async fn text_output_is_verbatim() {
        let exec = executor(FakeProvider::default());
        let result = exec
            .execute(&ToolCallRequest::new("c1", "text", "{}"), &ToolRegistry::new())
            .await;
        assert_eq!(result.output, "plain words");
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_output() {
        let provider = Arc::new(FakeProvider::default());
        let exec = ToolExecutor::new(provider.clone());

        let result = exec
            .execute(&ToolCallRequest::new("c1", "echo", "{not json"), &ToolRegistry::new())
            .await;
        assert!(result.output.starts_with("Error: invalid arguments for tool echo"));

        let result = exec
            .execute(&ToolCallRequest::new("c2", "echo", "[1, 2]"), &ToolRegistry::new())
            .await;
        assert!(result.output.contains("expected a JSON object"));

        // Neither call reached the provider.
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_arguments_mean_no_arguments() {
        let exec = executor(FakeProvider::default());
        let result = exec
            .execute(&ToolCallRequest::new("c1", "echo", ""), &ToolRegistry::new())
            .await;
        assert_eq!(result.output, "{}");
    }

    #[tokio::test]
    async fn batch_keeps_order_and_isolates_failures() {
        let provider = FakeProvider {
            failing: ["t1", "t3"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let exec = executor(provider);
        let calls: Vec<_> = (0..5)
            .map(|i| ToolCallRequest::new(format!("id{i}"), format!("t{i}"), format!(r#"{{"n":{i}}}"#)))
            .collect();

        let results = exec.execute_all(&calls, &ToolRegistry::new()).await;

        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.tool_call_id, format!("id{i}"));
            if i == 1 || i == 3 {
                assert_eq!(result.output, format!("Error: tool call failed: t{i} exploded"));
            } else {
                assert_eq!(result.output, format!(r#"{{"n":{i}}}"#));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_times_out_on_schedule() {
        let timeout = Duration::from_secs(30);
        let exec = executor(FakeProvider::default()).with_timeout(Some(timeout));

        let started = Instant::now();
        let result = exec
            .execute(&ToolCallRequest::new("c1", "hang", "{}"), &ToolRegistry::new())
            .await;
        let elapsed = started.elapsed();

        assert!(result.output.starts_with("Error: "));
        assert!(result.output.contains("MCP call timed out after 30 seconds"));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_does_not_stop_the_batch() {
        let exec = executor(FakeProvider::default()).with_timeout(Some(Duration::from_secs(1)));
        let calls = vec![
            ToolCallRequest::new("a", "hang", "{}"),
            ToolCallRequest::new("b", "echo", r#"{"ok":true}"#),
        ];
        let results = exec.execute_all(&calls, &ToolRegistry::new()).await;
        assert!(results[0].output.contains("timed out"));
        assert_eq!(results[1].output, r#"{"ok":true}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_message_keeps_fractions() {
        let exec = executor(FakeProvider::default()).with_timeout(Some(Duration::from_millis(500)));
        let result = exec
            .execute(&ToolCallRequest::new("c1", "hang", "{}"), &ToolRegistry::new())
            .await;
        assert_eq!(result.output, "Error: MCP call timed out after 0.5 seconds");

        let exec = executor(FakeProvider::default()).with_timeout(Some(Duration::from_secs(1)));
        let result = exec
            .execute(&ToolCallRequest::new("c2", "hang", "{}"), &ToolRegistry::new())
            .await;
        assert_eq!(result.output, "Error: MCP call timed out after 1 second");
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_timeout_waits_for_slow_calls() {
        let exec = executor(FakeProvider::default()).with_timeout(None);

        let started = Instant::now();
        let result = exec
            .execute(&ToolCallRequest::new("c1", "slow", "{}"), &ToolRegistry::new())
            .await;

        assert_eq!(result.output, "worth the wait");
        assert!(started.elapsed() >= Duration::from_secs(60));
    }
}
