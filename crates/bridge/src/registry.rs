//! Tool registry with prompt-based tool detection.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::catalog::{InputSchema, ToolDescriptor};

/// Shortest name segment that counts as a detection term on its own.
const MIN_SEGMENT_LEN: usize = 4;

/// Extra per-tool hints supplied by configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProfile {
    /// System prompt to use when a message looks like it is about this tool.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Words that, found in a prompt, point at this tool.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A tool known to the registry.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: InputSchema,
    pub instructions: Option<String>,
    terms: Vec<String>,
}

impl RegisteredTool {
    fn new(descriptor: ToolDescriptor, profile: ToolProfile) -> Self {
        let terms = detection_terms(&descriptor.name, &profile.keywords);
        Self {
            name: descriptor.name,
            description: descriptor.description,
            input_schema: descriptor.input_schema.unwrap_or_default(),
            instructions: profile.instructions,
            terms,
        }
    }

    /// The tool as a provider would list it.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: Some(self.input_schema.clone()),
        }
    }
}

/// Tools indexed by name, in registration order.
///
/// Registration order matters: when several tools match a prompt, the one
/// registered first wins.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh registry, attaching any profile whose key matches a
    /// tool name.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
        profiles: &BTreeMap<String, ToolProfile>,
    ) -> Self {
        let mut registry = Self::new();
        for descriptor in descriptors {
            let profile = profiles.get(&descriptor.name).cloned().unwrap_or_default();
            registry.register_tool_with_profile(descriptor, profile);
        }
        registry
    }

    /// Register a tool with no instructions, replacing any tool of the same
    /// name.
    pub fn register_tool(&mut self, descriptor: ToolDescriptor) {
        self.register_tool_with_profile(descriptor, ToolProfile::default());
    }

    /// Register a tool with a profile.
    ///
    /// A replaced tool keeps its original position but loses its old
    /// profile.
    pub fn register_tool_with_profile(&mut self, descriptor: ToolDescriptor, profile: ToolProfile) {
        let tool = RegisteredTool::new(descriptor, profile);
        match self.index.get(&tool.name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(tool.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tool_instructions(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|tool| tool.instructions.as_deref())
    }

    /// Map a tool name as spelled by a model onto a registered name.
    ///
    /// Exact names win; otherwise case and `-`/`_` differences are ignored.
    pub fn resolve_name(&self, requested: &str) -> Option<&str> {
        if let Some(tool) = self.get(requested) {
            return Some(&tool.name);
        }
        let wanted = normalize_name(requested);
        self.tools
            .iter()
            .find(|tool| normalize_name(&tool.name) == wanted)
            .map(|tool| tool.name.as_str())
    }

    /// Best-effort guess at which tool a prompt is about.
    ///
    /// A tool matches when the prompt mentions its name, its name with
    /// separators turned into spaces, a long enough segment of its name, or
    /// one of its keywords. Single-word terms match the start of any word in
    /// the prompt ("medication" matches "medications").
    pub fn detect_tool_from_prompt(&self, prompt: &str) -> Option<&str> {
        let lowered = prompt.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.tools
            .iter()
            .find(|tool| {
                tool.terms
                    .iter()
                    .any(|term| term_matches(term, &lowered, &words))
            })
            .map(|tool| tool.name.as_str())
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

fn detection_terms(name: &str, keywords: &[String]) -> Vec<String> {
    let lowered = name.trim().to_lowercase();
    let mut terms = Vec::new();
    let mut push = |term: String| {
        let term = term.trim().to_string();
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    };

    push(lowered.clone());
    push(lowered.replace(['-', '_'], " "));
    for segment in lowered.split(|c: char| !c.is_alphanumeric()) {
        if segment.chars().count() >= MIN_SEGMENT_LEN {
            push(segment.to_string());
        }
    }
    for keyword in keywords {
        push(keyword.to_lowercase());
    }
    terms
}

fn term_matches(term: &str, prompt: &str, words: &[&str]) -> bool {
    if term.chars().all(char::is_alphanumeric) {
        words.iter().any(|word| word.starts_with(term))
    } else {
        prompt.contains(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: None,
        }
    }

    fn profile(instructions: &str, keywords: &[&str]) -> ToolProfile {
        ToolProfile {
            instructions: Some(instructions.to_string()),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn instructions_round_trip() {
        let mut registry = ToolRegistry::new();
        registry.register_tool_with_profile(
            descriptor("query-fhir", "Query FHIR resources"),
            profile("use FHIR", &[]),
        );
        registry.register_tool(descriptor("ping", "Ping"));

        assert_eq!(registry.tool_instructions("query-fhir"), Some("use FHIR"));
        assert_eq!(registry.tool_instructions("ping"), None);
        assert_eq!(registry.tool_instructions("missing"), None);
    }

    #[test]
    fn later_registration_overwrites_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register_tool_with_profile(descriptor("a", "first"), profile("old", &[]));
        registry.register_tool(descriptor("b", "other"));
        registry.register_tool(descriptor("a", "second"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().description.as_deref(), Some("second"));
        assert_eq!(registry.tool_instructions("a"), None);
        let order: Vec<_> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn detects_exact_name() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(descriptor("query-fhir", "Query FHIR resources"));
        assert_eq!(
            registry.detect_tool_from_prompt("please run query-fhir for me"),
            Some("query-fhir")
        );
        assert_eq!(
            registry.detect_tool_from_prompt("Query FHIR for vitals"),
            Some("query-fhir")
        );
    }

    #[test]
    fn detects_keywords_by_word_prefix() {
        let mut registry = ToolRegistry::new();
        registry.register_tool_with_profile(
            descriptor("query-fhir", "Query FHIR resources"),
            profile("fhir prompt", &["medication", "vital signs"]),
        );
        assert_eq!(
            registry.detect_tool_from_prompt("show me active medications"),
            Some("query-fhir")
        );
        assert_eq!(
            registry.detect_tool_from_prompt("latest Vital Signs please"),
            Some("query-fhir")
        );
        assert_eq!(registry.detect_tool_from_prompt("premedication"), None);
    }

    #[test]
    fn no_match_is_none() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(descriptor("query-fhir", "Query FHIR resources"));
        assert_eq!(registry.detect_tool_from_prompt("what's the weather"), None);
        assert_eq!(ToolRegistry::new().detect_tool_from_prompt("anything"), None);
    }

    #[test]
    fn first_registered_wins_ties() {
        let mut registry = ToolRegistry::new();
        registry.register_tool_with_profile(descriptor("labs", "Lab results"), profile("a", &["patient"]));
        registry.register_tool_with_profile(descriptor("meds", "Medications"), profile("b", &["patient"]));

        for _ in 0..3 {
            assert_eq!(
                registry.detect_tool_from_prompt("tell me about the patient"),
                Some("labs")
            );
        }
    }

    #[test]
    fn short_segments_are_not_terms() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(descriptor("get-lab", "Labs"));
        assert_eq!(registry.detect_tool_from_prompt("get me a coffee"), None);
        assert_eq!(registry.detect_tool_from_prompt("get lab results"), Some("get-lab"));
    }

    #[test]
    fn resolves_model_spellings() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(descriptor("query-fhir", "Query"));
        assert_eq!(registry.resolve_name("query-fhir"), Some("query-fhir"));
        assert_eq!(registry.resolve_name("Query_FHIR"), Some("query-fhir"));
        assert_eq!(registry.resolve_name("query"), None);
    }

    #[test]
    fn from_descriptors_starts_fresh() {
        let mut profiles = BTreeMap::new();
        profiles.insert("query-fhir".to_string(), profile("fhir prompt", &[]));

        let registry = ToolRegistry::from_descriptors(
            vec![descriptor("query-fhir", "Query"), descriptor("ping", "Ping")],
            &profiles,
        );
        assert_eq!(registry.tool_instructions("query-fhir"), Some("fhir prompt"));

        let rebuilt = ToolRegistry::from_descriptors(
            vec![descriptor("query-fhir", "Query")],
            &BTreeMap::new(),
        );
        assert_eq!(rebuilt.tool_instructions("query-fhir"), None);
        assert!(!rebuilt.contains("ping"));
    }
}
