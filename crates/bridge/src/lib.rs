//! Bridge between an LLM and MCP tool servers.
//!
//! The bridge turns a tool server's catalog into function-calling specs,
//! hands them to a model, and resolves the tool calls the model makes until
//! it produces a final answer.
//!
//! # Overview
//!
//! - **Bridge**: runs a user turn, picking per-tool system instructions and
//!   looping over tool rounds.
//! - **ToolProvider**: where tools live. [`McpProvider`] talks to an MCP
//!   server over stdio.
//! - **ModelClient**: the LLM side. [`ChatClient`] speaks the
//!   OpenAI-compatible chat completions API.
//! - **ToolRegistry**: known tools, their instructions, and prompt-based
//!   detection.
//!
//! # Example
//!
//! ```ignore
//! use bridge::{Bridge, BridgeConfig, ChatClient, McpProvider};
//!
//! # async fn example() -> bridge::Result<()> {
//! let config = BridgeConfig::load("bridge_config.json");
//! let provider = McpProvider::new(config.server_config()?);
//! let model = ChatClient::builder(&config.llm.base_url, &config.llm.model).build();
//!
//! let mut bridge = Bridge::new(provider, model, config.bridge_options());
//! bridge.initialize().await;
//! println!("{}", bridge.process_message("show me active medications").await);
//! bridge.close().await;
//! # Ok(())
//! # }
//! ```

mod bridge;
pub mod catalog;
pub mod config;
mod error;
pub mod executor;
pub mod model;
pub mod provider;
pub mod providers;
pub mod registry;

pub use bridge::{Bridge, BridgeOptions};
pub use catalog::{FunctionSpec, InputSchema, ToolDescriptor, convert};
pub use config::{BridgeConfig, ConfigError, LlmConfig, ServerParams};
pub use error::{Error, Result};
pub use executor::{DEFAULT_TOOL_TIMEOUT, ToolError, ToolExecutor};
pub use model::{ModelClient, ModelError, ModelReply, ToolCallRequest, ToolCallResult};
pub use provider::{McpProvider, ProviderError, ToolOutput, ToolProvider};
pub use providers::{ChatClient, ChatClientBuilder};
pub use registry::{RegisteredTool, ToolProfile, ToolRegistry};
