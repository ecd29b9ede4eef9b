//! The bridge loop: user text in, model text out, tools resolved in between.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::catalog::{self, FunctionSpec, ToolDescriptor};
use crate::config::{DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_TOOL_TIMEOUT_SECS};
use crate::executor::ToolExecutor;
use crate::model::ModelClient;
use crate::provider::ToolProvider;
use crate::registry::{RegisteredTool, ToolProfile, ToolRegistry};
use crate::{Error, Result};

/// Knobs for a [`Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Tool rounds allowed per message; `0` means no limit.
    pub max_tool_rounds: usize,
    /// Deadline per tool call; `None` means no deadline.
    pub tool_timeout: Option<Duration>,
    /// Instructions and detection keywords keyed by tool name.
    pub tool_profiles: BTreeMap<String, ToolProfile>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tool_timeout: Some(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            tool_profiles: BTreeMap::new(),
        }
    }
}

/// Connects a model client to a tool provider.
///
/// The registry is shared with the model client and swapped whole whenever
/// the tool set changes, so detection, execution and name resolution always
/// agree on the same tools.
pub struct Bridge<P, M> {
    provider: Arc<P>,
    model: M,
    executor: ToolExecutor<P>,
    registry: Arc<ToolRegistry>,
    tools: Vec<FunctionSpec>,
    profiles: BTreeMap<String, ToolProfile>,
    /// The model's prompt before detection swapped anything in.
    base_prompt: Option<String>,
    max_tool_rounds: usize,
    closed: bool,
}

impl<P: ToolProvider, M: ModelClient> Bridge<P, M> {
    pub fn new(provider: P, model: M, options: BridgeOptions) -> Self {
        let provider = Arc::new(provider);
        let executor = ToolExecutor::new(Arc::clone(&provider)).with_timeout(options.tool_timeout);
        let base_prompt = model.system_prompt().map(str::to_string);
        Self {
            provider,
            model,
            executor,
            registry: Arc::new(ToolRegistry::new()),
            tools: Vec::new(),
            profiles: options.tool_profiles,
            base_prompt,
            max_tool_rounds: options.max_tool_rounds,
            closed: false,
        }
    }

    /// Connect to the provider and load its tools.
    ///
    /// Returns `false` (after logging why) when the tools could not be
    /// loaded; the bridge still works, just without tools.
    pub async fn initialize(&mut self) -> bool {
        match self.load_tools().await {
            Ok(()) => {
                info!(tools = self.tools.len(), "bridge initialized");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to initialize bridge");
                false
            }
        }
    }

    async fn load_tools(&mut self) -> Result<()> {
        self.provider.connect().await?;
        let descriptors = self.provider.list_tools().await?;
        for descriptor in &descriptors {
            debug!(tool = %descriptor.name, "registering tool");
        }

        let registry = ToolRegistry::from_descriptors(descriptors, &self.profiles);
        self.install(registry);
        Ok(())
    }

    /// Replace the tool set. The new registry carries no instructions.
    pub fn set_tools(&mut self, tools: Vec<FunctionSpec>) {
        let registry =
            ToolRegistry::from_descriptors(tools.iter().map(ToolDescriptor::from), &BTreeMap::new());
        self.install(registry);
        info!(tools = self.tools.len(), "tool set replaced");
    }

    /// Offer the model exactly one function per registered tool. A name
    /// listed twice keeps its first position and its last definition.
    fn install(&mut self, registry: ToolRegistry) {
        let descriptors: Vec<_> = registry.iter().map(RegisteredTool::descriptor).collect();
        self.tools = catalog::convert(&descriptors);
        self.registry = Arc::new(registry);
        self.model.set_tools(self.tools.clone(), Arc::clone(&self.registry));
    }

    /// Start a new conversation with the same tools.
    ///
    /// Drops the model's history and restores the system prompt the bridge
    /// started with.
    pub fn reset(&mut self) {
        self.model.clear_history();
        self.model.set_system_prompt(self.base_prompt.clone());
        info!("conversation reset");
    }

    /// Run one user turn to completion.
    ///
    /// Never fails: errors come back as `Error processing message: ...`.
    pub async fn process_message(&mut self, message: &str) -> String {
        match self.run_turn(message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "error processing message");
                format!("Error processing message: {e}")
            }
        }
    }

    async fn run_turn(&mut self, message: &str) -> Result<String> {
        if let Some(tool) = self.registry.detect_tool_from_prompt(message) {
            debug!(tool, "message matched tool");
            if let Some(instructions) = self.registry.tool_instructions(tool) {
                self.model.set_system_prompt(Some(instructions.to_string()));
            }
        }

        let mut reply = self.model.invoke_with_prompt(message).await?;
        let mut rounds = 0;
        while reply.is_tool_call() {
            if self.max_tool_rounds > 0 && rounds >= self.max_tool_rounds {
                return Err(Error::ToolRoundLimit(self.max_tool_rounds));
            }
            rounds += 1;
            info!(round = rounds, calls = reply.tool_calls.len(), "executing tool calls");

            let results = self
                .executor
                .execute_all(&reply.tool_calls, &self.registry)
                .await;
            reply = self.model.invoke(results).await?;
        }

        debug!(rounds, "turn complete");
        Ok(reply.content)
    }

    /// Close the provider. Later calls do nothing.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.provider.close().await;
        info!("bridge closed");
    }

    /// Tools currently offered to the model.
    pub fn tools(&self) -> &[FunctionSpec] {
        &self.tools
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}
