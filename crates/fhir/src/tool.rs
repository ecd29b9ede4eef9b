//! The `query-fhir` MCP tool.

use mcp::{CallToolResult, ServerInfo, Tool, ToolHandler};
use serde_json::{Value, json};
use tracing::error;

use crate::client::FhirClient;
use crate::query::{QueryArgs, QuerySummary};
use crate::{Error, Result};

pub const TOOL_NAME: &str = "query-fhir";

const ENDPOINT_VAR: &str = "FHIR_API_BASE";
const TOKEN_VAR: &str = "FHIR_AUTH_TOKEN";

/// Exposes FHIR search as a single MCP tool.
#[derive(Debug, Clone)]
pub struct FhirTool {
    client: FhirClient,
    default_token: Option<String>,
}

impl FhirTool {
    pub fn new(client: FhirClient) -> Self {
        Self {
            client,
            default_token: None,
        }
    }

    /// Token used when a call does not bring its own.
    pub fn with_default_token(mut self, token: impl Into<String>) -> Self {
        self.default_token = Some(token.into());
        self
    }

    /// Build from `FHIR_API_BASE` and the optional `FHIR_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(ENDPOINT_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::MissingEndpoint)?;
        let tool = Self::new(FhirClient::new(endpoint));
        Ok(match std::env::var(TOKEN_VAR) {
            Ok(token) if !token.is_empty() => tool.with_default_token(token),
            _ => tool,
        })
    }

    pub fn client(&self) -> &FhirClient {
        &self.client
    }

    async fn query(&self, arguments: Option<Value>) -> Result<String> {
        let args: QueryArgs = serde_json::from_value(arguments.unwrap_or(Value::Null))?;
        let token = Some(args.auth_token.as_str())
            .filter(|t| !t.is_empty())
            .or(self.default_token.as_deref());

        let bundle = self.client.search(&args.search_params, token).await?;
        let summary = QuerySummary::from(bundle);
        Ok(serde_json::to_string_pretty(&summary)?)
    }
}

impl ToolHandler for FhirTool {
    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: "fhir".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }

    fn tools(&self) -> Vec<Tool> {
        vec![Tool {
            name: TOOL_NAME.to_string(),
            description: Some("Query FHIR resources".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "searchParams": {
                        "type": "object",
                        "properties": {
                            "from": {"type": "string"},
                            "where": {
                                "type": "object",
                                "additionalProperties": {"type": "string"}
                            }
                        },
                        "required": ["from", "where"]
                    },
                    "authToken": {"type": "string"}
                },
                "required": ["searchParams"]
            }),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
        if name != TOOL_NAME {
            return CallToolResult::error(format!("unknown tool: {name}"));
        }
        match self.query(arguments).await {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                error!(error = %e, "FHIR query failed");
                CallToolResult::error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn call_args(token: &str) -> Value {
        json!({
            "searchParams": {
                "from": "MedicationRequest",
                "where": {"patient": "example", "status": "active"}
            },
            "authToken": token
        })
    }

    #[tokio::test]
    async fn successful_query_returns_pretty_summary() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").header("authorization", "Bearer t");
                then.status(200).json_body(json!({
                    "resourceType": "Bundle",
                    "total": 1,
                    "entry": [{"resource": {
                        "resourceType": "MedicationRequest",
                        "status": "active",
                        "medicationCodeableConcept": {"text": "Aspirin 81mg"}
                    }}]
                }));
            })
            .await;

        let tool = FhirTool::new(FhirClient::new(server.url("/")));
        let result = tool.call_tool(TOOL_NAME, Some(call_args("t"))).await;

        assert!(!result.is_error);
        let text = result.joined_text().unwrap();
        assert!(text.contains('\n'));
        let summary: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(summary["count"], 1);
        assert_eq!(summary["entries"][0]["medication"], "Aspirin 81mg");
    }

    #[tokio::test]
    async fn empty_token_falls_back_to_default() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).header("authorization", "Bearer from-env");
                then.status(200).json_body(json!({"resourceType": "Bundle"}));
            })
            .await;

        let tool = FhirTool::new(FhirClient::new(server.url("/"))).with_default_token("from-env");
        let result = tool.call_tool(TOOL_NAME, Some(call_args(""))).await;

        mock.assert_async().await;
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn http_failure_is_an_error_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(500);
            })
            .await;

        let tool = FhirTool::new(FhirClient::new(server.url("/")));
        let result = tool.call_tool(TOOL_NAME, Some(call_args("t"))).await;
        assert!(result.is_error);
        assert_eq!(
            result.joined_text().as_deref(),
            Some("FHIR request failed with status 500")
        );
    }

    #[tokio::test]
    async fn bad_arguments_and_unknown_tools() {
        let tool = FhirTool::new(FhirClient::new("http://127.0.0.1:9"));

        let result = tool.call_tool(TOOL_NAME, Some(json!({"authToken": "t"}))).await;
        assert!(result.is_error);
        assert!(result.joined_text().unwrap().starts_with("invalid arguments"));

        let result = tool.call_tool("drop-tables", None).await;
        assert!(result.is_error);
        assert_eq!(result.joined_text().as_deref(), Some("unknown tool: drop-tables"));
    }

    #[tokio::test]
    async fn served_over_json_rpc() {
        let tool = FhirTool::new(FhirClient::new("http://127.0.0.1:9"));
        let response = mcp::dispatch(&tool, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .await
            .unwrap();
        let result = response.into_result().unwrap();
        assert_eq!(result["tools"][0]["name"], TOOL_NAME);
        assert_eq!(
            result["tools"][0]["inputSchema"]["required"],
            json!(["searchParams"])
        );
    }
}
