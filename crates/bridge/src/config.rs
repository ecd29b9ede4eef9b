//! Bridge configuration.
//!
//! A JSON file overlays a built-in default: top-level keys replace the
//! default, while `mcpServers`, `toolProfiles` and the fields of `llm` merge
//! key by key. A missing or unreadable file is not an error; the defaults
//! are used and a warning is logged.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::bridge::BridgeOptions;
use crate::registry::ToolProfile;

/// File looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "bridge_config.json";

/// Name of the tool server the bridge connects to unless told otherwise.
pub const DEFAULT_TOOL_SERVER: &str = "fhir";

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

const DEFAULT_MODEL: &str = "llama3.2:8b";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const FHIR_INSTRUCTIONS: &str = r#"You answer questions about a patient's health record by querying FHIR resources with the query-fhir tool.

Call query-fhir with arguments of this exact shape:
{
  "searchParams": {
    "from": "<RESOURCE_TYPE>",
    "where": { "<search parameter>": "<value>" }
  }
}

Resource types:
- MedicationRequest: medications and prescriptions
- Observation: vital signs and lab results
- Patient: demographics
- Condition: diagnoses
- Procedure: procedures
- AllergyIntolerance: allergies

Rules:
1. "from" must be one of the resource types above.
2. "where" holds FHIR search parameters as strings.
3. Always include "patient": "example" in "where", except for Patient, where you use "id": "example".
4. Never put URLs in parameter values.

Examples:
- Active medications: {"searchParams": {"from": "MedicationRequest", "where": {"patient": "example", "status": "active"}}}
- Vital signs: {"searchParams": {"from": "Observation", "where": {"patient": "example", "category": "vital-signs"}}}
- Demographics: {"searchParams": {"from": "Patient", "where": {"id": "example"}}}

After the tool answers, summarize the entries for the user in plain language."#;

const FHIR_KEYWORDS: &[&str] = &[
    "fhir",
    "medication",
    "medicine",
    "prescription",
    "drug",
    "dosage",
    "vital",
    "blood pressure",
    "heart rate",
    "lab",
    "observation",
    "allergy",
    "allergies",
    "condition",
    "diagnos",
    "procedure",
    "patient",
    "demographic",
];

/// Errors from reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tool server '{0}' is not configured under mcpServers")]
    MissingServer(String),
}

/// How to launch one MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerParams {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Model endpoint settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Accepted for compatibility; replies are always requested whole.
    pub stream: bool,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            stream: false,
            api_key: None,
        }
    }
}

/// Complete, immutable bridge configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub mcp_servers: BTreeMap<String, ServerParams>,
    pub llm: LlmConfig,
    pub system_prompt: Option<String>,
    /// Key into `mcp_servers` naming the server whose tools are bridged.
    pub tool_server: String,
    pub tool_profiles: BTreeMap<String, ToolProfile>,
    /// `0` lifts the limit.
    pub max_tool_rounds: usize,
    /// `0` lets tool calls run without a deadline.
    pub tool_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let mut mcp_servers = BTreeMap::new();
        mcp_servers.insert(
            DEFAULT_TOOL_SERVER.to_string(),
            ServerParams {
                command: "fhir-mcp".to_string(),
                args: Vec::new(),
                env: BTreeMap::new(),
            },
        );

        let mut tool_profiles = BTreeMap::new();
        tool_profiles.insert(
            "query-fhir".to_string(),
            ToolProfile {
                instructions: Some(FHIR_INSTRUCTIONS.to_string()),
                keywords: FHIR_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            },
        );

        Self {
            mcp_servers,
            llm: LlmConfig::default(),
            system_prompt: Some(FHIR_INSTRUCTIONS.to_string()),
            tool_server: DEFAULT_TOOL_SERVER.to_string(),
            tool_profiles,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

/// The file as written; everything optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    mcp_servers: BTreeMap<String, ServerParams>,
    #[serde(default)]
    llm: Option<LlmOverrides>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    tool_server: Option<String>,
    #[serde(default)]
    tool_profiles: BTreeMap<String, ToolProfile>,
    #[serde(default)]
    max_tool_rounds: Option<usize>,
    #[serde(default)]
    tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmOverrides {
    model: Option<String>,
    base_url: Option<String>,
    stream: Option<bool>,
    api_key: Option<String>,
}

impl BridgeConfig {
    /// Load from `path`, falling back to defaults (with a warning) when the
    /// file is missing or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded bridge configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load bridge configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`, reporting any problem.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a JSON document and overlay it on the defaults.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Ok(Self::default().overlay(file))
    }

    fn overlay(mut self, file: ConfigFile) -> Self {
        self.mcp_servers.extend(file.mcp_servers);
        self.tool_profiles.extend(file.tool_profiles);

        if let Some(llm) = file.llm {
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(stream) = llm.stream {
                self.llm.stream = stream;
            }
            if llm.api_key.is_some() {
                self.llm.api_key = llm.api_key;
            }
        }
        if file.system_prompt.is_some() {
            self.system_prompt = file.system_prompt;
        }
        if let Some(tool_server) = file.tool_server {
            self.tool_server = tool_server;
        }
        if let Some(rounds) = file.max_tool_rounds {
            self.max_tool_rounds = rounds;
        }
        if let Some(secs) = file.tool_timeout_secs {
            self.tool_timeout_secs = secs;
        }
        self
    }

    /// Launch parameters of the configured tool server.
    pub fn server_config(&self) -> Result<mcp::ServerConfig, ConfigError> {
        let params = self
            .mcp_servers
            .get(&self.tool_server)
            .ok_or_else(|| ConfigError::MissingServer(self.tool_server.clone()))?;
        Ok(mcp::ServerConfig {
            name: self.tool_server.clone(),
            command: params.command.clone(),
            args: params.args.clone(),
            env: params.env.clone().into_iter().collect(),
        })
    }

    /// `None` when `tool_timeout_secs` is `0`.
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            max_tool_rounds: self.max_tool_rounds,
            tool_timeout: self.tool_timeout(),
            tool_profiles: self.tool_profiles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_describe_the_fhir_setup() {
        let config = BridgeConfig::default();
        let server = config.server_config().unwrap();
        assert_eq!(server.name, "fhir");
        assert_eq!(server.command, "fhir-mcp");
        assert_eq!(config.llm.model, "llama3.2:8b");
        assert!(!config.llm.stream);
        assert_eq!(config.max_tool_rounds, 10);
        assert_eq!(config.tool_timeout(), Some(Duration::from_secs(30)));

        let profile = &config.tool_profiles["query-fhir"];
        assert!(profile.instructions.as_deref().unwrap().contains("query-fhir"));
        assert!(profile.keywords.iter().any(|k| k == "medication"));
    }

    #[test]
    fn overlay_merges_servers_and_llm_fields() {
        let config = BridgeConfig::parse(
            r#"{
                "mcpServers": {
                    "weather": {"command": "weather-mcp", "args": ["--units", "metric"]}
                },
                "llm": {"model": "qwen2.5:7b"},
                "systemPrompt": "custom",
                "maxToolRounds": 3
            }"#,
        )
        .unwrap();

        assert!(config.mcp_servers.contains_key("fhir"));
        assert_eq!(config.mcp_servers["weather"].args, vec!["--units", "metric"]);
        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.system_prompt.as_deref(), Some("custom"));
        assert_eq!(config.max_tool_rounds, 3);
        assert_eq!(config.tool_timeout_secs, DEFAULT_TOOL_TIMEOUT_SECS);
    }

    #[test]
    fn zero_tool_timeout_disables_the_deadline() {
        let config = BridgeConfig::parse(r#"{"toolTimeoutSecs": 0, "maxToolRounds": 0}"#).unwrap();
        assert_eq!(config.tool_timeout(), None);
        assert_eq!(config.bridge_options().tool_timeout, None);
        assert_eq!(config.bridge_options().max_tool_rounds, 0);

        let config = BridgeConfig::parse(r#"{"toolTimeoutSecs": 5}"#).unwrap();
        assert_eq!(config.bridge_options().tool_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn overriding_a_server_replaces_it_whole() {
        let config = BridgeConfig::parse(
            r#"{"mcpServers": {"fhir": {"command": "node", "args": ["dist/index.js"],
                "env": {"FHIR_API_BASE": "http://localhost:8080"}}}}"#,
        )
        .unwrap();
        let server = config.server_config().unwrap();
        assert_eq!(server.command, "node");
        assert_eq!(server.env["FHIR_API_BASE"], "http://localhost:8080");
    }

    #[test]
    fn tool_server_must_exist() {
        let config = BridgeConfig::parse(r#"{"toolServer": "nope"}"#).unwrap();
        assert!(matches!(
            config.server_config(),
            Err(ConfigError::MissingServer(name)) if name == "nope"
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(dir.path().join("absent.json"));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn malformed_file_falls_back_but_try_load_reports() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        assert_eq!(BridgeConfig::load(file.path()), BridgeConfig::default());
        assert!(matches!(
            BridgeConfig::try_load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"llm": {{"baseUrl": "http://gpu:8000/v1", "apiKey": "k"}}}}"#).unwrap();

        let config = BridgeConfig::load(file.path());
        assert_eq!(config.llm.base_url, "http://gpu:8000/v1");
        assert_eq!(config.llm.api_key.as_deref(), Some("k"));
    }
}
