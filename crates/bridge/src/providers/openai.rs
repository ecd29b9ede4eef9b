//! OpenAI-compatible chat completions backend.
//!
//! Works with any server speaking `/v1/chat/completions` with function
//! calling: Ollama, vLLM, llama.cpp, OpenAI itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::FunctionSpec;
use crate::model::{
    FunctionCall, ModelClient, ModelError, ModelReply, ToolCallRequest, ToolCallResult,
};
use crate::registry::ToolRegistry;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const ABANDONED_CALL_OUTPUT: &str = "Error: tool call abandoned";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ApiMessage>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [FunctionSpec],
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ApiMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ApiToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiResponseFunction,
}

/// Some servers send `arguments` as an object instead of a JSON string.
#[derive(Debug, Deserialize)]
struct ApiResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a chat client.
#[derive(Debug, Clone)]
pub struct ChatClientBuilder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    system_prompt: Option<String>,
}

impl ChatClientBuilder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            system_prompt: None,
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> ChatClient {
        ChatClient {
            http: reqwest::Client::new(),
            url: join_url(&self.base_url, CHAT_COMPLETIONS_PATH),
            model: self.model,
            api_key: self.api_key,
            system_prompt: self.system_prompt,
            tools: Vec::new(),
            registry: Arc::new(ToolRegistry::new()),
            history: Vec::new(),
        }
    }
}

/// Chat client that keeps the conversation in memory.
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    system_prompt: Option<String>,
    tools: Vec<FunctionSpec>,
    registry: Arc<ToolRegistry>,
    history: Vec<ApiMessage>,
}

impl ChatClient {
    pub fn builder(base_url: impl Into<String>, model: impl Into<String>) -> ChatClientBuilder {
        ChatClientBuilder::new(base_url, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &[FunctionSpec] {
        &self.tools
    }

    /// Number of messages remembered, excluding the system prompt.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Append `pending` to the conversation and ask for the next reply.
    ///
    /// On failure the conversation is left as it was before the call.
    async fn exchange(&mut self, pending: Vec<ApiMessage>) -> Result<ModelReply, ModelError> {
        let mark = self.history.len();
        self.history.extend(pending);

        match self.complete().await {
            Ok(reply) => {
                self.history.push(ApiMessage::Assistant {
                    content: reply.content.clone(),
                    tool_calls: reply
                        .tool_calls
                        .iter()
                        .map(|call| ApiToolCall {
                            id: call.id.clone(),
                            kind: "function",
                            function: call.function.clone(),
                        })
                        .collect(),
                });
                Ok(reply)
            }
            Err(e) => {
                self.history.truncate(mark);
                Err(e)
            }
        }
    }

    /// Answers for calls the previous turn left open, e.g. when it hit the
    /// tool round limit. Servers reject a user message that follows
    /// unanswered tool calls.
    fn abandoned_calls(&self) -> Vec<ApiMessage> {
        match self.history.last() {
            Some(ApiMessage::Assistant { tool_calls, .. }) => tool_calls
                .iter()
                .map(|call| ApiMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: ABANDONED_CALL_OUTPUT.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    async fn complete(&self) -> Result<ModelReply, ModelError> {
        let system = self.system_prompt.clone().map(|content| ApiMessage::System { content });
        let request = ApiRequest {
            model: &self.model,
            messages: system.iter().chain(self.history.iter()).collect(),
            tools: &self.tools,
            stream: false,
        };

        info!(
            model = %self.model,
            messages = request.messages.len(),
            tools = self.tools.len(),
            "sending request to model"
        );

        let mut req = self.http.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model server rejected request");
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let message = api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ModelError::NoChoices)?;

        let reply = self.to_reply(message);
        debug!(
            content = %reply.content,
            tool_calls = reply.tool_calls.len(),
            "model replied"
        );
        Ok(reply)
    }

    fn to_reply(&self, message: ApiResponseMessage) -> ModelReply {
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let id = call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let requested = call.function.name;
                let name = match self.registry.resolve_name(&requested) {
                    Some(name) => name.to_string(),
                    None => {
                        warn!(tool = %requested, "model requested an unknown tool");
                        requested
                    }
                };
                let arguments = match call.function.arguments {
                    Value::String(raw) => raw,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                ToolCallRequest {
                    id,
                    function: FunctionCall { name, arguments },
                }
            })
            .collect();

        ModelReply {
            content: message.content.unwrap_or_default(),
            tool_calls,
        }
    }
}

impl std::fmt::Display for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai-compatible({}, {})", self.model, self.url)
    }
}

impl ModelClient for ChatClient {
    fn set_tools(&mut self, tools: Vec<FunctionSpec>, registry: Arc<ToolRegistry>) {
        self.tools = tools;
        self.registry = registry;
    }

    fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt;
    }

    fn clear_history(&mut self) {
        debug!(messages = self.history.len(), "clearing conversation");
        self.history.clear();
    }

    async fn invoke_with_prompt(&mut self, prompt: &str) -> Result<ModelReply, ModelError> {
        let mut pending = self.abandoned_calls();
        pending.push(ApiMessage::User {
            content: prompt.to_string(),
        });
        self.exchange(pending).await
    }

    async fn invoke(&mut self, results: Vec<ToolCallResult>) -> Result<ModelReply, ModelError> {
        let messages = results
            .into_iter()
            .map(|result| ApiMessage::Tool {
                tool_call_id: result.tool_call_id,
                content: result.output,
            })
            .collect();
        self.exchange(messages).await
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    // Accept base URLs that already end in /v1.
    let path = if base.ends_with("/v1") {
        path.trim_start_matches("/v1")
    } else {
        path
    };
    format!("{base}{path}")
}
